//! A sorted, disjoint set of IPv4 ranges that answers membership queries by
//! binary search instead of a linear scan or a trie.

mod blacklist;
mod range;

pub use blacklist::NetBlacklist;
pub use range::Net;
