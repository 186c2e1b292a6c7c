/// Stable identifier for a node in a `Graph`'s arena. Monotonically
/// increasing in allocation order, so `parent.0 < child.0` always holds
/// (§4.3: "Parent ids are strictly less than child id").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "%{}", self.0)
    }
}
