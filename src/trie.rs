use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Type-erased, shared value slot. Erasure lets one trie hold payloads of
/// mixed types; a lookup with the wrong type reads as absence.
type ValueRef = Arc<dyn Any + Send + Sync>;

/// One immutable trie node. Nodes are never mutated after publication:
/// mutating operations clone the nodes on the affected path and share every
/// other subtree with the previous version.
#[derive(Clone, Default)]
struct TrieNode {
    children: HashMap<char, Arc<TrieNode>>,
    value: Option<ValueRef>,
}

impl TrieNode {
    fn is_prunable(&self) -> bool {
        self.children.is_empty() && self.value.is_none()
    }
}

/// A persistent (copy-on-write) character-keyed map.
///
/// Every mutating operation returns a new `Trie`; the receiver is left
/// untouched and stays valid, so arbitrarily many versions can coexist and
/// be read concurrently without synchronization.
#[derive(Clone, Default)]
pub struct Trie {
    root: Option<Arc<TrieNode>>,
}

impl Trie {
    /// Creates an empty trie.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up `key` and borrows its value as `T`. Returns None when the
    /// key is absent or when the stored value is not a `T`.
    pub fn get<T: 'static>(&self, key: &str) -> Option<&T> {
        let mut node = self.root.as_deref()?;
        for c in key.chars() {
            node = node.children.get(&c)?.as_ref();
        }
        node.value.as_ref()?.downcast_ref::<T>()
    }

    /// Returns a new trie in which `key` maps to `value`. Only the nodes on
    /// the key's path are freshly allocated (at most `key.chars().count() + 1`);
    /// everything off the path is shared with `self`. An existing node at
    /// the key keeps its children.
    pub fn put<T: Any + Send + Sync>(&self, key: &str, value: T) -> Trie {
        let value: ValueRef = Arc::new(value);
        let path: Vec<char> = key.chars().collect();
        let root = Self::put_node(self.root.as_deref(), &path, value);
        Trie {
            root: Some(Arc::new(root)),
        }
    }

    /// Returns a new trie without `key`. When the key is absent (or present
    /// without a value) the input trie is returned unchanged. Nodes left
    /// both childless and valueless by the removal are pruned bottom-up;
    /// the root itself is never pruned.
    pub fn remove(&self, key: &str) -> Trie {
        let Some(root) = self.root.as_deref() else {
            return self.clone();
        };
        let path: Vec<char> = key.chars().collect();
        match Self::remove_node(root, &path) {
            None => self.clone(),
            Some(Some(node)) => Trie {
                root: Some(Arc::new(node)),
            },
            Some(None) => Trie {
                root: Some(Arc::new(TrieNode::default())),
            },
        }
    }

    /// Rebuilds the path for an insertion. `node` is the existing node at
    /// this position, if any; the returned node replaces it.
    fn put_node(node: Option<&TrieNode>, path: &[char], value: ValueRef) -> TrieNode {
        let mut copy = node.cloned().unwrap_or_default();
        match path.split_first() {
            None => {
                copy.value = Some(value);
                copy
            }
            Some((&c, rest)) => {
                let child = copy.children.get(&c).map(Arc::clone);
                let rebuilt = Self::put_node(child.as_deref(), rest, value);
                copy.children.insert(c, Arc::new(rebuilt));
                copy
            }
        }
    }

    /// Rebuilds the path for a removal. Outer None means the key holds no
    /// value under `node` and the trie is unchanged; `Some(None)` means the
    /// rebuilt node pruned away entirely.
    fn remove_node(node: &TrieNode, path: &[char]) -> Option<Option<TrieNode>> {
        match path.split_first() {
            None => {
                node.value.as_ref()?;
                let mut copy = node.clone();
                copy.value = None;
                if copy.is_prunable() {
                    Some(None)
                } else {
                    Some(Some(copy))
                }
            }
            Some((&c, rest)) => {
                let child = node.children.get(&c)?;
                let rebuilt = Self::remove_node(child, rest)?;
                let mut copy = node.clone();
                match rebuilt {
                    Some(n) => {
                        copy.children.insert(c, Arc::new(n));
                    }
                    None => {
                        copy.children.remove(&c);
                    }
                }
                if copy.is_prunable() {
                    Some(None)
                } else {
                    Some(Some(copy))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_put_roundtrip() {
        let trie = Trie::new().put("hello", 7u32);
        assert_eq!(trie.get::<u32>("hello"), Some(&7));
        assert_eq!(trie.get::<u32>("hell"), None);
        assert_eq!(trie.get::<u32>("helloo"), None);
    }

    #[test]
    fn test_type_mismatch_reads_as_absence() {
        let trie = Trie::new().put("k", 1u32);
        assert_eq!(trie.get::<String>("k"), None);
        assert_eq!(trie.get::<u32>("k"), Some(&1));
    }

    #[test]
    fn test_empty_key_lives_at_root() {
        let trie = Trie::new().put("", String::from("root"));
        assert_eq!(trie.get::<String>(""), Some(&String::from("root")));

        let trie = trie.remove("");
        assert_eq!(trie.get::<String>(""), None);
    }

    #[test]
    fn test_put_preserves_existing_children() {
        let trie = Trie::new().put("ab", 1u32).put("a", 2u32);
        assert_eq!(trie.get::<u32>("ab"), Some(&1));
        assert_eq!(trie.get::<u32>("a"), Some(&2));
    }

    #[test]
    fn test_put_shares_untouched_subtrees() {
        let t1 = Trie::new().put("ab", 1u32).put("cd", 2u32);
        let t2 = t1.put("cx", 3u32);

        // The subtree under 'a' is off the insertion path and must be the
        // very same node, not a copy.
        let a1 = &t1.root.as_ref().unwrap().children[&'a'];
        let a2 = &t2.root.as_ref().unwrap().children[&'a'];
        assert!(Arc::ptr_eq(a1, a2));

        // The 'c' node is on the path and must have been cloned.
        let c1 = &t1.root.as_ref().unwrap().children[&'c'];
        let c2 = &t2.root.as_ref().unwrap().children[&'c'];
        assert!(!Arc::ptr_eq(c1, c2));
        // ...but its untouched 'd' child is shared between the clones.
        assert!(Arc::ptr_eq(&c1.children[&'d'], &c2.children[&'d']));
    }

    #[test]
    fn test_remove_prunes_empty_path() {
        let trie = Trie::new().put("abc", 1u32);
        let removed = trie.remove("abc");

        // The whole chain under the root was childless and valueless.
        assert!(removed.root.as_ref().unwrap().children.is_empty());
        assert_eq!(removed.get::<u32>("abc"), None);
    }

    #[test]
    fn test_remove_keeps_valued_ancestors() {
        let trie = Trie::new().put("a", 1u32).put("abc", 2u32);
        let removed = trie.remove("abc");

        assert_eq!(removed.get::<u32>("a"), Some(&1));
        assert_eq!(removed.get::<u32>("abc"), None);
        // Pruning stops at the valued 'a' node; its now-empty subtree is gone.
        let a = &removed.root.as_ref().unwrap().children[&'a'];
        assert!(a.children.is_empty());
    }

    #[test]
    fn test_remove_keeps_terminal_children() {
        let trie = Trie::new().put("ab", 1u32).put("abcd", 2u32);
        let removed = trie.remove("ab");

        assert_eq!(removed.get::<u32>("ab"), None);
        assert_eq!(removed.get::<u32>("abcd"), Some(&2));
    }

    #[test]
    fn test_remove_missing_key_returns_same_root() {
        let trie = Trie::new().put("ab", 1u32);

        let unchanged = trie.remove("zz");
        assert!(Arc::ptr_eq(
            trie.root.as_ref().unwrap(),
            unchanged.root.as_ref().unwrap()
        ));

        // Present as a prefix but valueless counts as missing too.
        let unchanged = trie.remove("a");
        assert!(Arc::ptr_eq(
            trie.root.as_ref().unwrap(),
            unchanged.root.as_ref().unwrap()
        ));
    }

    #[test]
    fn test_old_versions_are_immutable() {
        let t0 = Trie::new();
        let t1 = t0.put("ab", 1u32);
        let t2 = t1.put("ab", 2u32);
        let t3 = t2.remove("ab");

        assert_eq!(t0.get::<u32>("ab"), None);
        assert_eq!(t1.get::<u32>("ab"), Some(&1));
        assert_eq!(t2.get::<u32>("ab"), Some(&2));
        assert_eq!(t3.get::<u32>("ab"), None);
    }

    #[test]
    fn test_non_copy_values() {
        let trie = Trie::new().put("owned", String::from("payload"));
        assert_eq!(
            trie.get::<String>("owned").map(String::as_str),
            Some("payload")
        );
    }
}
