//! Query helpers over recorded generations.

use std::fmt::Write as _;
use std::str::FromStr;

use serde::Serialize;
use tl_core::Real;
use tl_kernel::Generation;

use crate::error::{AppError, AppResult};

/// Summary of one recorded run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub generation: usize,
    pub time_range: (Real, Real),
    pub sample_count: usize,
    pub port_count: usize,
}

pub fn summarize(generation: &Generation) -> AppResult<RunSummary> {
    let time = generation.time();
    let (Some(&first), Some(&last)) = (time.first(), time.last()) else {
        return Err(AppError::NoData {
            generation: Some(generation.number()),
        });
    };
    Ok(RunSummary {
        generation: generation.number(),
        time_range: (first, last),
        sample_count: time.len(),
        port_count: generation.ports().count(),
    })
}

/// `component.port` labels of every recorded port.
pub fn list_ports(generation: &Generation) -> Vec<String> {
    generation
        .ports()
        .map(|(component, port)| format!("{component}.{port}"))
        .collect()
}

/// One exported column, written as `component.port.variable`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub component: String,
    pub port: String,
    pub variable: String,
}

impl FromStr for Column {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        let mut parts = s.rsplitn(3, '.');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(variable), Some(port), Some(component))
                if !variable.is_empty() && !port.is_empty() && !component.is_empty() =>
            {
                Ok(Column {
                    component: component.to_string(),
                    port: port.to_string(),
                    variable: variable.to_string(),
                })
            }
            _ => Err(AppError::InvalidInput(format!(
                "expected component.port.variable, got '{s}'"
            ))),
        }
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.component, self.port, self.variable)
    }
}

/// CSV with a `time_s` column followed by the requested series.
pub fn to_csv(generation: &Generation, columns: &[Column]) -> AppResult<String> {
    let series = columns
        .iter()
        .map(|c| generation.series(&c.component, &c.port, &c.variable))
        .collect::<Result<Vec<_>, _>>()?;

    let mut csv = String::from("time_s");
    for c in columns {
        let _ = write!(csv, ",{c}");
    }
    csv.push('\n');
    for (i, t) in generation.time().iter().enumerate() {
        let _ = write!(csv, "{t}");
        for s in &series {
            let _ = write!(csv, ",{}", s[i]);
        }
        csv.push('\n');
    }
    Ok(csv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn column_splits_on_the_last_two_dots() {
        let c: Column = "Sub/orifice.P2.Flow".parse().unwrap();
        assert_eq!(c.component, "Sub/orifice");
        assert_eq!(c.port, "P2");
        assert_eq!(c.variable, "Flow");
        assert_eq!(c.to_string(), "Sub/orifice.P2.Flow");
    }

    proptest! {
        #[test]
        fn nested_paths_keep_their_separators(
            path in "[A-Za-z][A-Za-z0-9_]{0,6}(/[A-Za-z][A-Za-z0-9_]{0,6}){0,3}",
            port in "[A-Za-z][A-Za-z0-9]{0,4}",
        ) {
            let c: Column = format!("{path}.{port}.Value").parse().unwrap();
            prop_assert_eq!(c.component, path);
            prop_assert_eq!(c.port, port);
        }
    }

    #[test]
    fn incomplete_columns_are_rejected() {
        for bad in ["orifice.P2", "orifice..Flow", "Flow", ""] {
            assert!(bad.parse::<Column>().is_err(), "{bad}");
        }
    }
}
