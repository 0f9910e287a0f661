//! Static dependency graph of the pipeline.
//!
//! The graph is a pure function of the configuration: it is computed once,
//! before any step runs, and never edited afterwards.

use std::collections::{BTreeSet, HashMap, HashSet};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::config::PipelineConfig;

use super::types::{ExecuteError, StepId};

/// Edges present in every session, as (dependency, dependent).
const BASE_EDGES: [(StepId, StepId); 5] = [
  (StepId::InstallCMake, StepId::Configure),
  (StepId::Configure, StepId::Compile),
  (StepId::Compile, StepId::StageHeaders),
  (StepId::Compile, StepId::PreBuild),
  (StepId::StageHeaders, StepId::PreBuild),
];

/// Edges added when the source tree is fetched rather than supplied through
/// the override directory.
const SOURCE_EDGES: [(StepId, StepId); 3] = [
  (StepId::Download, StepId::Unpack),
  (StepId::Unpack, StepId::Configure),
  (StepId::Unpack, StepId::StageHeaders),
];

pub struct PipelineGraph {
  graph: DiGraph<StepId, ()>,
  nodes: HashMap<StepId, NodeIndex>,
}

impl PipelineGraph {
  /// The pipeline graph, with or without the download and unpack steps.
  pub fn new(fetch_source: bool) -> Self {
    let mut edges = BASE_EDGES.to_vec();
    let steps: Vec<StepId> = if fetch_source {
      edges.extend(SOURCE_EDGES);
      StepId::ALL.to_vec()
    } else {
      StepId::ALL
        .into_iter()
        .filter(|s| !matches!(s, StepId::Download | StepId::Unpack))
        .collect()
    };
    Self::assemble(&steps, &edges)
  }

  pub fn from_config(config: &PipelineConfig) -> Self {
    Self::new(!config.source_override)
  }

  /// Build a graph over `steps`. Edges touching a step outside `steps` are
  /// dropped.
  fn assemble(steps: &[StepId], edges: &[(StepId, StepId)]) -> Self {
    let mut graph = DiGraph::new();
    let mut nodes = HashMap::new();

    for &step in steps {
      nodes.entry(step).or_insert_with(|| graph.add_node(step));
    }
    for (from, to) in edges {
      if let (Some(&a), Some(&b)) = (nodes.get(from), nodes.get(to)) {
        graph.add_edge(a, b, ());
      }
    }

    Self { graph, nodes }
  }

  pub fn contains(&self, step: StepId) -> bool {
    self.nodes.contains_key(&step)
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  /// Scheduled steps in declaration order.
  pub fn steps(&self) -> Vec<StepId> {
    StepId::ALL.into_iter().filter(|s| self.contains(*s)).collect()
  }

  /// Direct dependencies of a step, sorted.
  pub fn dependencies(&self, step: StepId) -> Vec<StepId> {
    let Some(&idx) = self.nodes.get(&step) else {
      return Vec::new();
    };

    let deps: BTreeSet<StepId> = self
      .graph
      .neighbors_directed(idx, Direction::Incoming)
      .map(|dep| self.graph[dep])
      .collect();
    deps.into_iter().collect()
  }

  /// Steps grouped into waves: every step's dependencies lie in earlier
  /// waves, so the steps of one wave may run concurrently.
  pub fn waves(&self) -> Result<Vec<Vec<StepId>>, ExecuteError> {
    let mut in_degree: HashMap<NodeIndex, usize> = self
      .graph
      .node_indices()
      .map(|idx| (idx, self.graph.neighbors_directed(idx, Direction::Incoming).count()))
      .collect();
    let mut remaining: HashSet<NodeIndex> = self.graph.node_indices().collect();
    let mut waves = Vec::new();

    while !remaining.is_empty() {
      let ready: Vec<NodeIndex> = remaining.iter().filter(|idx| in_degree[*idx] == 0).copied().collect();
      if ready.is_empty() {
        return Err(ExecuteError::CycleDetected);
      }

      for idx in &ready {
        remaining.remove(idx);
        for dependent in self.graph.neighbors_directed(*idx, Direction::Outgoing) {
          if let Some(deg) = in_degree.get_mut(&dependent) {
            *deg = deg.saturating_sub(1);
          }
        }
      }

      let mut wave: Vec<StepId> = ready.into_iter().map(|idx| self.graph[idx]).collect();
      wave.sort();
      waves.push(wave);
    }

    Ok(waves)
  }

  /// The sub-graph needed to run `target`: the target and all its
  /// transitive dependencies.
  pub fn closure(&self, target: StepId) -> Result<PipelineGraph, ExecuteError> {
    let &start = self.nodes.get(&target).ok_or(ExecuteError::NotScheduled(target))?;

    let mut keep = HashSet::from([start]);
    let mut stack = vec![start];
    while let Some(idx) = stack.pop() {
      for dep in self.graph.neighbors_directed(idx, Direction::Incoming) {
        if keep.insert(dep) {
          stack.push(dep);
        }
      }
    }

    let steps: Vec<StepId> = StepId::ALL
      .into_iter()
      .filter(|s| self.nodes.get(s).is_some_and(|idx| keep.contains(idx)))
      .collect();
    let edges: Vec<(StepId, StepId)> = self
      .graph
      .edge_indices()
      .filter_map(|e| self.graph.edge_endpoints(e))
      .map(|(a, b)| (self.graph[a], self.graph[b]))
      .collect();

    Ok(Self::assemble(&steps, &edges))
  }
}
