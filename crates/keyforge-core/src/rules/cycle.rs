// Keyforge Cycle Detection
// Depth-first search over the source -> target remap graph

use indexmap::IndexMap;

use crate::KeyName;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

/// Find a remap cycle among `edges`, returning its path with the first node
/// repeated at the end (`c -> a -> b -> c`).
///
/// Self edges are ignored: a key mapped to itself is a no-op, not a loop.
/// Nodes are explored in first-seen order, so the reported path is stable
/// and starts from the earliest edge that takes part in a cycle.
pub fn find_cycle<'a, I>(edges: I) -> Option<Vec<KeyName>>
where
    I: IntoIterator<Item = (&'a KeyName, &'a KeyName)>,
{
    let mut graph: IndexMap<&'a KeyName, Vec<&'a KeyName>> = IndexMap::new();
    for (source, target) in edges {
        let successors = graph.entry(source).or_default();
        if source != target {
            successors.push(target);
        }
        graph.entry(target).or_default();
    }

    let mut marks = vec![Mark::Unvisited; graph.len()];
    let mut stack = Vec::new();

    for start in 0..graph.len() {
        if marks[start] == Mark::Unvisited {
            if let Some(path) = visit(&graph, start, &mut marks, &mut stack) {
                return Some(path);
            }
        }
    }
    None
}

fn visit(
    graph: &IndexMap<&KeyName, Vec<&KeyName>>,
    node: usize,
    marks: &mut [Mark],
    stack: &mut Vec<usize>,
) -> Option<Vec<KeyName>> {
    marks[node] = Mark::OnStack;
    stack.push(node);

    let (_, targets) = graph.get_index(node)?;
    for target in targets {
        let Some(next) = graph.get_index_of(*target) else {
            continue;
        };
        match marks[next] {
            Mark::OnStack => {
                let from = stack.iter().position(|&n| n == next).unwrap_or(0);
                let mut path: Vec<KeyName> = stack[from..]
                    .iter()
                    .filter_map(|&n| graph.get_index(n).map(|(key, _)| (*key).clone()))
                    .collect();
                path.push((*target).clone());
                return Some(path);
            }
            Mark::Unvisited => {
                if let Some(path) = visit(graph, next, marks, stack) {
                    return Some(path);
                }
            }
            Mark::Done => {}
        }
    }

    stack.pop();
    marks[node] = Mark::Done;
    None
}

/// Render a cycle path for display
pub fn format_path(path: &[KeyName]) -> String {
    path.iter()
        .map(KeyName::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}
