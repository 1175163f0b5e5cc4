// tl-core/src/units.rs
//
// Parameter values are stored in SI. Text input may carry a unit suffix
// ("10 bar", "2 mm"); conversion to the declared SI unit goes through uom.

use crate::error::{TlError, TlResult};
use uom::si::f64::{
    Angle, AngularVelocity, Area, Length, MassDensity, Pressure, ThermodynamicTemperature, Time,
    Volume, VolumeRate,
};

/// Split `"<number> [unit]"` into its numeric part and optional unit suffix.
///
/// Returns `None` when the leading token is not a number.
pub fn split_quantity(text: &str) -> Option<(f64, Option<&str>)> {
    let mut parts = text.split_whitespace();
    let value: f64 = parts.next()?.parse().ok()?;
    let unit = parts.next();
    if parts.next().is_some() {
        return None;
    }
    Some((value, unit))
}

/// Convert `value` expressed in `given` into the declared SI unit.
pub fn to_si(value: f64, given: &str, declared: &str) -> TlResult<f64> {
    if given == declared {
        return Ok(value);
    }
    let incompatible = || TlError::IncompatibleUnit {
        given: given.to_string(),
        expected: declared.to_string(),
    };
    let unknown = || TlError::UnknownUnit {
        unit: given.to_string(),
    };

    match declared {
        "Pa" => {
            use uom::si::pressure::{bar, kilopascal, megapascal, pascal, psi};
            let q = match given {
                "kPa" => Pressure::new::<kilopascal>(value),
                "MPa" => Pressure::new::<megapascal>(value),
                "bar" => Pressure::new::<bar>(value),
                "psi" => Pressure::new::<psi>(value),
                _ => return Err(classify(given).map_or_else(unknown, |_| incompatible())),
            };
            Ok(q.get::<pascal>())
        }
        "m" => {
            use uom::si::length::{centimeter, inch, kilometer, meter, millimeter};
            let q = match given {
                "mm" => Length::new::<millimeter>(value),
                "cm" => Length::new::<centimeter>(value),
                "km" => Length::new::<kilometer>(value),
                "in" => Length::new::<inch>(value),
                _ => return Err(classify(given).map_or_else(unknown, |_| incompatible())),
            };
            Ok(q.get::<meter>())
        }
        "m^2" => {
            use uom::si::area::{square_centimeter, square_meter, square_millimeter};
            let q = match given {
                "mm^2" => Area::new::<square_millimeter>(value),
                "cm^2" => Area::new::<square_centimeter>(value),
                _ => return Err(classify(given).map_or_else(unknown, |_| incompatible())),
            };
            Ok(q.get::<square_meter>())
        }
        "m^3" => {
            use uom::si::volume::{cubic_centimeter, cubic_meter, liter};
            let q = match given {
                "l" => Volume::new::<liter>(value),
                "cm^3" => Volume::new::<cubic_centimeter>(value),
                _ => return Err(classify(given).map_or_else(unknown, |_| incompatible())),
            };
            Ok(q.get::<cubic_meter>())
        }
        "m^3/s" => {
            use uom::si::volume_rate::{cubic_meter_per_second, liter_per_minute, liter_per_second};
            let q = match given {
                "l/min" => VolumeRate::new::<liter_per_minute>(value),
                "l/s" => VolumeRate::new::<liter_per_second>(value),
                _ => return Err(classify(given).map_or_else(unknown, |_| incompatible())),
            };
            Ok(q.get::<cubic_meter_per_second>())
        }
        "s" => {
            use uom::si::time::{hour, millisecond, minute, second};
            let q = match given {
                "ms" => Time::new::<millisecond>(value),
                "min" => Time::new::<minute>(value),
                "h" => Time::new::<hour>(value),
                _ => return Err(classify(given).map_or_else(unknown, |_| incompatible())),
            };
            Ok(q.get::<second>())
        }
        "rad/s" => {
            use uom::si::angular_velocity::{radian_per_second, revolution_per_minute};
            let q = match given {
                "rpm" => AngularVelocity::new::<revolution_per_minute>(value),
                _ => return Err(classify(given).map_or_else(unknown, |_| incompatible())),
            };
            Ok(q.get::<radian_per_second>())
        }
        "rad" => {
            use uom::si::angle::{degree, radian};
            let q = match given {
                "deg" => Angle::new::<degree>(value),
                _ => return Err(classify(given).map_or_else(unknown, |_| incompatible())),
            };
            Ok(q.get::<radian>())
        }
        "kg/m^3" => {
            use uom::si::mass_density::{gram_per_cubic_centimeter, kilogram_per_cubic_meter};
            let q = match given {
                "g/cm^3" => MassDensity::new::<gram_per_cubic_centimeter>(value),
                _ => return Err(classify(given).map_or_else(unknown, |_| incompatible())),
            };
            Ok(q.get::<kilogram_per_cubic_meter>())
        }
        "K" => {
            use uom::si::thermodynamic_temperature::{degree_celsius, kelvin};
            let q = match given {
                "degC" => ThermodynamicTemperature::new::<degree_celsius>(value),
                _ => return Err(classify(given).map_or_else(unknown, |_| incompatible())),
            };
            Ok(q.get::<kelvin>())
        }
        _ => Err(classify(given).map_or_else(unknown, |_| incompatible())),
    }
}

/// Parse `"<number> [unit]"` into a value in the declared SI unit.
pub fn parse_si(text: &str, declared: &str) -> TlResult<f64> {
    let (value, unit) = split_quantity(text).ok_or(TlError::InvalidArg {
        what: "expected a number with optional unit suffix",
    })?;
    match unit {
        Some(u) => to_si(value, u, declared),
        None => Ok(value),
    }
}

/// SI base unit of a known suffix, used only to tell "unknown" from "wrong dimension".
fn classify(unit: &str) -> Option<&'static str> {
    match unit {
        "Pa" | "kPa" | "MPa" | "bar" | "psi" => Some("Pa"),
        "m" | "mm" | "cm" | "km" | "in" => Some("m"),
        "m^2" | "mm^2" | "cm^2" => Some("m^2"),
        "m^3" | "l" | "cm^3" => Some("m^3"),
        "m^3/s" | "l/min" | "l/s" => Some("m^3/s"),
        "s" | "ms" | "min" | "h" => Some("s"),
        "rad/s" | "rpm" => Some("rad/s"),
        "rad" | "deg" => Some("rad"),
        "kg/m^3" | "g/cm^3" => Some("kg/m^3"),
        "K" | "degC" => Some("K"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
    }

    #[test]
    fn split_plain_and_suffixed() {
        assert_eq!(split_quantity("1e5"), Some((1e5, None)));
        assert_eq!(split_quantity("10 bar"), Some((10.0, Some("bar"))));
        assert_eq!(split_quantity("rho"), None);
        assert_eq!(split_quantity("1 2 3"), None);
    }

    #[test]
    fn converts_common_units() {
        assert!(close(parse_si("10 bar", "Pa").unwrap(), 1e6));
        assert!(close(parse_si("2 mm", "m").unwrap(), 2e-3));
        assert!(close(parse_si("60 l/min", "m^3/s").unwrap(), 1e-3));
        assert!(close(parse_si("5 ms", "s").unwrap(), 5e-3));
        assert!(close(
            parse_si("60 rpm", "rad/s").unwrap(),
            2.0 * std::f64::consts::PI
        ));
        assert!(close(parse_si("0 degC", "K").unwrap(), 273.15));
    }

    #[test]
    fn each_declared_unit_accepts_its_suffixes() {
        let cases = [
            ("1.5 MPa", "Pa", 1.5e6),
            ("1 psi", "Pa", 6894.757),
            ("1 in", "m", 0.0254),
            ("4 mm^2", "m^2", 4e-6),
            ("2 l", "m^3", 2e-3),
            ("3 l/s", "m^3/s", 3e-3),
            ("2 h", "s", 7200.0),
            ("180 deg", "rad", std::f64::consts::PI),
            ("0.87 g/cm^3", "kg/m^3", 870.0),
        ];
        for (text, declared, expected) in cases {
            let got = parse_si(text, declared).unwrap();
            assert!(close(got, expected), "{text} -> {got}, expected {expected}");
        }
    }

    #[test]
    fn same_unit_is_identity() {
        assert_eq!(parse_si("3.5 Pa", "Pa").unwrap(), 3.5);
        assert_eq!(parse_si("3.5", "Pa").unwrap(), 3.5);
    }

    #[test]
    fn rejects_wrong_dimension() {
        let err = parse_si("3 mm", "Pa").unwrap_err();
        assert!(matches!(err, TlError::IncompatibleUnit { .. }));
    }

    #[test]
    fn rejects_unknown_unit() {
        let err = parse_si("3 furlongs", "m").unwrap_err();
        assert!(matches!(err, TlError::UnknownUnit { .. }));
    }
}
