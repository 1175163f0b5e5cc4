//! Retained time series of every node, one generation per run.

use crate::error::{KernelError, KernelResult};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use tl_core::Real;
use tl_node::{Node, NodeType};

/// One run's recorded data.
#[derive(Clone, Debug)]
pub struct Generation {
    number: usize,
    time: Vec<Real>,
    node_types: Vec<NodeType>,
    /// `series[node][slot][sample]`
    series: Vec<Vec<Vec<Real>>>,
    /// `(component path, port name)` to node index.
    keys: BTreeMap<(String, String), usize>,
}

impl Generation {
    pub fn number(&self) -> usize {
        self.number
    }

    pub fn time(&self) -> &[Real] {
        &self.time
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Recorded `(component path, port)` pairs.
    pub fn ports(&self) -> impl Iterator<Item = (&str, &str)> {
        self.keys.keys().map(|(c, p)| (c.as_str(), p.as_str()))
    }

    /// Series for a variable given by full or short name.
    pub fn series(&self, component: &str, port: &str, variable: &str) -> KernelResult<&[Real]> {
        let &node = self
            .keys
            .get(&(component.to_string(), port.to_string()))
            .ok_or_else(|| KernelError::PortNotFound {
                component: component.to_string(),
                port: port.to_string(),
            })?;
        let slot = self.node_types[node].variable_index(variable)?;
        Ok(&self.series[node][slot])
    }

    pub fn node_type(&self, component: &str, port: &str) -> Option<NodeType> {
        self.keys
            .get(&(component.to_string(), port.to_string()))
            .map(|&n| self.node_types[n])
    }
}

/// Live side of a generation: the nodes being sampled.
#[derive(Debug, Default)]
pub(crate) struct Recorder {
    nodes: Vec<Arc<Node>>,
}

impl Recorder {
    pub fn sample(&self, generation: &mut Generation, time: Real) {
        generation.time.push(time);
        for (node, slots) in self.nodes.iter().zip(generation.series.iter_mut()) {
            for (slot, series) in slots.iter_mut().enumerate() {
                series.push(node.get(slot));
            }
        }
    }
}

#[derive(Debug)]
pub struct LogData {
    max_generations: usize,
    generations: VecDeque<Generation>,
    next_number: usize,
}

impl Default for LogData {
    fn default() -> Self {
        Self::new(5)
    }
}

impl LogData {
    pub fn new(max_generations: usize) -> Self {
        Self {
            max_generations: max_generations.max(1),
            generations: VecDeque::new(),
            next_number: 0,
        }
    }

    pub fn set_max_generations(&mut self, n: usize) {
        self.max_generations = n.max(1);
        self.trim();
    }

    /// Start a generation over `(path, port, node)` triples; nodes are deduplicated by identity.
    pub(crate) fn begin<'a>(
        &mut self,
        ports: impl IntoIterator<Item = (String, String, &'a Arc<Node>)>,
    ) -> Recorder {
        let mut recorder = Recorder::default();
        let mut index_of: HashMap<*const Node, usize> = HashMap::new();
        let mut keys = BTreeMap::new();
        for (path, port, node) in ports {
            let idx = *index_of.entry(Arc::as_ptr(node)).or_insert_with(|| {
                recorder.nodes.push(node.clone());
                recorder.nodes.len() - 1
            });
            keys.insert((path, port), idx);
        }
        let node_types: Vec<NodeType> = recorder.nodes.iter().map(|n| n.node_type()).collect();
        let series = node_types
            .iter()
            .map(|t| vec![Vec::new(); t.num_slots()])
            .collect();

        self.generations.push_back(Generation {
            number: self.next_number,
            time: Vec::new(),
            node_types,
            series,
            keys,
        });
        self.next_number += 1;
        self.trim();
        recorder
    }

    pub(crate) fn current_mut(&mut self) -> Option<&mut Generation> {
        self.generations.back_mut()
    }

    pub fn latest(&self) -> Option<&Generation> {
        self.generations.back()
    }

    pub fn generation(&self, number: usize) -> Option<&Generation> {
        self.generations.iter().find(|g| g.number == number)
    }

    /// Retained generation numbers, oldest first.
    pub fn generation_numbers(&self) -> Vec<usize> {
        self.generations.iter().map(|g| g.number).collect()
    }

    fn trim(&mut self) {
        while self.generations.len() > self.max_generations {
            self.generations.pop_front();
        }
    }
}
