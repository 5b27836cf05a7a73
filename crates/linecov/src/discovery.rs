//! Test Discovery
//!
//! Records which methods of which classes a test touched, so a runner can
//! map tests to the code they exercise. Instrumented code calls
//! [`MethodVisits::visit`] on method entry; the runner calls
//! [`DiscoveryRegistry::finish_test`] after each test.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Per-class visit bitmap, one flag per method id
#[derive(Debug)]
pub struct MethodVisits {
    class_name: String,
    method_names: Vec<String>,
    visited: Box<[AtomicBool]>,
}

impl MethodVisits {
    /// Create a bitmap for `method_names`; method ids are their indices
    #[must_use]
    pub fn new(class_name: &str, method_names: Vec<String>) -> Self {
        let visited = method_names.iter().map(|_| AtomicBool::new(false)).collect();
        Self {
            class_name: class_name.to_string(),
            method_names,
            visited,
        }
    }

    /// Class name
    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Number of traced methods
    #[must_use]
    pub fn len(&self) -> usize {
        self.visited.len()
    }

    /// Check if no methods are traced
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.visited.is_empty()
    }

    /// Mark `method_id` visited; unknown ids are ignored
    #[inline]
    pub fn visit(&self, method_id: usize) {
        if let Some(flag) = self.visited.get(method_id) {
            flag.store(true, Ordering::Relaxed);
        }
    }

    /// Check if `method_id` was visited
    #[must_use]
    pub fn is_visited(&self, method_id: usize) -> bool {
        self.visited
            .get(method_id)
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Names of visited methods, in method id order
    #[must_use]
    pub fn visited_names(&self) -> Vec<String> {
        self.method_names
            .iter()
            .zip(self.visited.iter())
            .filter(|(_, flag)| flag.load(Ordering::Relaxed))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Names of visited methods, clearing each flag as it is read
    ///
    /// A visit racing with this call lands either in the result or in the
    /// next snapshot, never in neither.
    pub fn take_visited_names(&self) -> Vec<String> {
        self.method_names
            .iter()
            .zip(self.visited.iter())
            .filter(|(_, flag)| flag.swap(false, Ordering::Relaxed))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Clear every flag
    pub fn reset(&self) {
        for flag in self.visited.iter() {
            flag.store(false, Ordering::Relaxed);
        }
    }
}

/// Methods one test visited, keyed by class name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestTrace {
    /// Test name
    pub test_name: String,
    /// Visited method names per class; classes with no visits are left out
    pub classes: BTreeMap<String, Vec<String>>,
}

impl TestTrace {
    /// Check if the test visited nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Check if the test visited `method_name` of `class_name`
    #[must_use]
    pub fn visited(&self, class_name: &str, method_name: &str) -> bool {
        self.classes
            .get(class_name)
            .is_some_and(|methods| methods.iter().any(|name| name == method_name))
    }
}

/// Visit bitmaps of every traced class
#[derive(Debug, Default)]
pub struct DiscoveryRegistry {
    classes: RwLock<HashMap<String, Arc<MethodVisits>>>,
}

impl DiscoveryRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bitmap for `class_name`, created on first trace
    ///
    /// Tracing a class again (another loader) returns the existing bitmap.
    pub fn trace(&self, class_name: &str, method_names: &[&str]) -> Arc<MethodVisits> {
        let existing = self
            .classes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(class_name)
            .cloned();
        if let Some(existing) = existing {
            return existing;
        }
        let mut classes = self.classes.write().unwrap_or_else(PoisonError::into_inner);
        let visits = classes.entry(class_name.to_string()).or_insert_with(|| {
            let names = method_names.iter().map(ToString::to_string).collect();
            Arc::new(MethodVisits::new(class_name, names))
        });
        Arc::clone(visits)
    }

    /// Number of traced classes
    #[must_use]
    pub fn class_count(&self) -> usize {
        self.classes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Snapshot the visits of the test that just ran and clear every bitmap
    pub fn finish_test(&self, test_name: &str) -> TestTrace {
        let classes = self.classes.read().unwrap_or_else(PoisonError::into_inner);
        let mut trace = TestTrace {
            test_name: test_name.to_string(),
            classes: BTreeMap::new(),
        };
        for (name, visits) in classes.iter() {
            let visited = visits.take_visited_names();
            if !visited.is_empty() {
                let _ = trace.classes.insert(name.clone(), visited);
            }
        }
        debug!(
            test = test_name,
            classes = trace.classes.len(),
            "finished test trace"
        );
        trace
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::thread;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    mod visits_tests {
        use super::*;

        #[test]
        fn test_visit_marks_method() {
            let visits = MethodVisits::new("Foo", names(&["<init>", "run", "stop"]));
            visits.visit(1);
            assert!(visits.is_visited(1));
            assert!(!visits.is_visited(0));
            assert_eq!(visits.visited_names(), vec!["run".to_string()]);
        }

        #[test]
        fn test_visit_unknown_id_ignored() {
            let visits = MethodVisits::new("Foo", names(&["run"]));
            visits.visit(7);
            assert!(!visits.is_visited(7));
            assert!(visits.visited_names().is_empty());
        }

        #[test]
        fn test_reset_clears_flags() {
            let visits = MethodVisits::new("Foo", names(&["a", "b"]));
            visits.visit(0);
            visits.visit(1);
            visits.reset();
            assert!(visits.visited_names().is_empty());
            assert_eq!(visits.len(), 2);
        }

        #[test]
        fn test_take_clears_each_flag_it_reads() {
            let visits = MethodVisits::new("Foo", names(&["a", "b"]));
            visits.visit(1);
            assert_eq!(visits.take_visited_names(), names(&["b"]));
            assert!(!visits.is_visited(1));

            visits.visit(0);
            assert_eq!(visits.take_visited_names(), names(&["a"]));
            assert!(visits.take_visited_names().is_empty());
        }

        #[test]
        fn test_take_during_visits_loses_nothing() {
            let visits = Arc::new(MethodVisits::new("Foo", names(&["a"])));
            let writer = {
                let visits = Arc::clone(&visits);
                thread::spawn(move || {
                    for _ in 0..10_000 {
                        visits.visit(0);
                    }
                })
            };
            let mut snapshots = 0;
            while !writer.is_finished() {
                if !visits.take_visited_names().is_empty() {
                    snapshots += 1;
                }
            }
            writer.join().unwrap();
            if !visits.take_visited_names().is_empty() {
                snapshots += 1;
            }
            assert!(snapshots >= 1);
            assert!(!visits.is_visited(0));
        }

        #[test]
        fn test_concurrent_visits() {
            let visits = Arc::new(MethodVisits::new("Foo", names(&["a", "b", "c", "d"])));
            let handles: Vec<_> = (0..4)
                .map(|id| {
                    let visits = Arc::clone(&visits);
                    thread::spawn(move || visits.visit(id))
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }
            assert_eq!(visits.visited_names().len(), 4);
        }
    }

    mod registry_tests {
        use super::*;

        #[test]
        fn test_retrace_returns_same_bitmap() {
            let registry = DiscoveryRegistry::new();
            let first = registry.trace("Foo", &["a", "b"]);
            let second = registry.trace("Foo", &["ignored"]);
            assert!(Arc::ptr_eq(&first, &second));
            assert_eq!(second.len(), 2);
            assert_eq!(registry.class_count(), 1);
        }

        #[test]
        fn test_finish_test_snapshots_and_clears() {
            let registry = DiscoveryRegistry::new();
            let foo = registry.trace("Foo", &["a", "b"]);
            let bar = registry.trace("Bar", &["x"]);
            foo.visit(1);

            let trace = registry.finish_test("testOne");
            assert_eq!(trace.test_name, "testOne");
            assert!(trace.visited("Foo", "b"));
            assert!(!trace.visited("Foo", "a"));
            assert!(!trace.classes.contains_key("Bar"));

            bar.visit(0);
            let trace = registry.finish_test("testTwo");
            assert!(trace.visited("Bar", "x"));
            assert!(!trace.visited("Foo", "b"));
        }

        #[test]
        fn test_finish_test_without_visits_is_empty() {
            let registry = DiscoveryRegistry::new();
            let _ = registry.trace("Foo", &["a"]);
            assert!(registry.finish_test("idle").is_empty());
        }
    }
}
