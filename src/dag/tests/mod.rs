//! DAG 模块单元测试
//!
//! 覆盖结构边、数据冲突边、合流/选择节点与确定性

use crate::dag::{resolve, ExecDag, NodeId, NodeKind};
use crate::device::Device;
use crate::error::RuntimeError;
use crate::graph::{Graph, LoopOptions, Predicate, TaskHandle};
use crate::resource::{ResourceKind, ResourceRegistry, View};

/// Registry with one buffer of 16 elements and one bool scalar.
fn registry() -> (ResourceRegistry, View, View) {
    let mut reg = ResourceRegistry::new();
    let buf = reg.create(ResourceKind::Buffer, "buf", 16);
    let pred = reg.create(ResourceKind::Scalar, "pred", 1);
    let buf_all = View::new(buf, 0, 16);
    let pred_slot = View::new(pred, 0, 1);
    (reg, buf_all, pred_slot)
}

/// Node id of the k-th declared task.
fn task_node(dag: &ExecDag, k: usize) -> NodeId {
    dag.nodes()
        .iter()
        .find(|n| n.task_handle() == Some(TaskHandle(k)))
        .map(|n| n.id())
        .expect("task node not lowered")
}

#[cfg(test)]
mod structural_tests {
    use super::*;

    #[test]
    fn test_seq_chains_children() {
        let (reg, _, _) = registry();
        let mut g = Graph::new("t");
        g.build(|root| {
            root.task("a").on(Device::cpu());
            root.task("b").on(Device::cpu());
            root.task("c").on(Device::cpu());
        })
        .unwrap();

        let dag = resolve(&g, &reg).unwrap();
        let (a, b, c) = (task_node(&dag, 0), task_node(&dag, 1), task_node(&dag, 2));
        assert!(dag.has_edge(a, b));
        assert!(dag.has_edge(b, c));
        assert!(!dag.has_edge(a, c));
        assert!(dag.reachable(a, c));
    }

    #[test]
    fn test_par_siblings_unordered_with_join() {
        let (reg, _, _) = registry();
        let mut g = Graph::new("t");
        g.build(|root| {
            root.par(|p| {
                p.task("x").on(Device::cpu());
                p.task("y").on(Device::cpu());
                p.task("z").on(Device::cpu());
            });
        })
        .unwrap();

        let dag = resolve(&g, &reg).unwrap();
        let (x, y, z) = (task_node(&dag, 0), task_node(&dag, 1), task_node(&dag, 2));
        for (s, t) in [(x, y), (y, x), (x, z), (z, y)] {
            assert!(!dag.has_edge(s, t));
        }
        // One synthetic join depends on all three exits.
        let joins: Vec<_> = dag
            .nodes()
            .iter()
            .filter(|n| matches!(n.kind(), NodeKind::Join))
            .collect();
        assert_eq!(joins.len(), 1);
        let join = joins[0].id();
        assert!(dag.has_edge(x, join));
        assert!(dag.has_edge(y, join));
        assert!(dag.has_edge(z, join));
    }

    #[test]
    fn test_par_join_is_exit_frontier() {
        let (reg, _, _) = registry();
        let mut g = Graph::new("t");
        g.build(|root| {
            root.par(|p| {
                p.task("x").on(Device::cpu());
                p.task("y").on(Device::cpu());
            });
            root.task("tail").on(Device::cpu());
        })
        .unwrap();

        let dag = resolve(&g, &reg).unwrap();
        let tail = task_node(&dag, 2);
        // The tail hangs off the join, not off the par children directly.
        let preds = dag.node(tail).preds();
        assert_eq!(preds.len(), 1);
        assert!(matches!(dag.node(preds[0]).kind(), NodeKind::Join));
    }

    #[test]
    fn test_empty_nested_blocks_do_not_break_chaining() {
        let (reg, _, _) = registry();
        let mut g = Graph::new("t");
        g.build(|root| {
            root.task("a").on(Device::cpu());
            root.par(|_| {});
            root.seq(|_| {});
            root.task("b").on(Device::cpu());
        })
        .unwrap();

        let dag = resolve(&g, &reg).unwrap();
        let (a, b) = (task_node(&dag, 0), task_node(&dag, 1));
        assert!(dag.has_edge(a, b));
        assert_eq!(dag.num_nodes(), 2);
    }

    #[test]
    fn test_sequential_loop_chains_iterations() {
        let (reg, _, _) = registry();
        let mut g = Graph::new("t");
        g.build(|root| {
            root.loop_(3, LoopOptions::sequential(), |it| {
                it.task("body").on(Device::cpu());
            });
        })
        .unwrap();

        let dag = resolve(&g, &reg).unwrap();
        let (i0, i1, i2) = (task_node(&dag, 0), task_node(&dag, 1), task_node(&dag, 2));
        assert!(dag.has_edge(i0, i1));
        assert!(dag.has_edge(i1, i2));
        assert!(dag.gates().is_empty());
    }

    #[test]
    fn test_parallel_loop_not_chained_and_gated() {
        let (reg, _, _) = registry();
        let mut g = Graph::new("t");
        g.build(|root| {
            root.loop_(4, LoopOptions::parallel(2), |it| {
                it.task("body").on(Device::cpu());
            });
        })
        .unwrap();

        let dag = resolve(&g, &reg).unwrap();
        let (i0, i1) = (task_node(&dag, 0), task_node(&dag, 1));
        assert!(!dag.has_edge(i0, i1));
        assert_eq!(dag.gates().len(), 1);
        let gate = &dag.gates()[0];
        assert_eq!(gate.max_inflight, 2);
        assert_eq!(gate.iterations.len(), 4);
    }

    #[test]
    fn test_parallel_loop_zero_inflight_behaves_as_one() {
        let (reg, _, _) = registry();
        let mut g = Graph::new("t");
        g.build(|root| {
            root.loop_(2, LoopOptions::parallel(0), |it| {
                it.task("body").on(Device::cpu());
            });
        })
        .unwrap();

        let dag = resolve(&g, &reg).unwrap();
        assert_eq!(dag.gates()[0].max_inflight, 1);
    }
}

#[cfg(test)]
mod conflict_tests {
    use super::*;

    #[test]
    fn test_overlapping_writers_ordered_by_declaration() {
        let (reg, buf, _) = registry();
        let mut g = Graph::new("t");
        g.build(|root| {
            root.par(|p| {
                p.task("w1").on(Device::cpu()).writes(&buf);
                p.task("w2").on(Device::cpu()).writes(&buf);
            });
        })
        .unwrap();

        let dag = resolve(&g, &reg).unwrap();
        let (w1, w2) = (task_node(&dag, 0), task_node(&dag, 1));
        assert!(dag.has_edge(w1, w2));
        assert!(!dag.has_edge(w2, w1));
    }

    #[test]
    fn test_read_read_never_conflicts() {
        let (reg, buf, _) = registry();
        let mut g = Graph::new("t");
        g.build(|root| {
            root.par(|p| {
                p.task("r1").on(Device::cpu()).reads(&buf);
                p.task("r2").on(Device::cpu()).reads(&buf);
            });
        })
        .unwrap();

        let dag = resolve(&g, &reg).unwrap();
        let (r1, r2) = (task_node(&dag, 0), task_node(&dag, 1));
        assert!(!dag.has_edge(r1, r2));
        assert!(!dag.has_edge(r2, r1));
    }

    #[test]
    fn test_disjoint_views_never_conflict() {
        let (reg, buf, _) = registry();
        let lo = View::new(buf.resource, 0, 8);
        let hi = View::new(buf.resource, 8, 8);
        let mut g = Graph::new("t");
        g.build(|root| {
            root.par(|p| {
                p.task("lo").on(Device::cpu()).writes(&lo);
                p.task("hi").on(Device::cpu()).writes(&hi);
            });
        })
        .unwrap();

        let dag = resolve(&g, &reg).unwrap();
        let (a, b) = (task_node(&dag, 0), task_node(&dag, 1));
        assert!(!dag.has_edge(a, b));
        assert!(!dag.has_edge(b, a));
    }

    #[test]
    fn test_no_duplicate_edge_when_structurally_ordered() {
        let (reg, buf, _) = registry();
        let mut g = Graph::new("t");
        g.build(|root| {
            root.task("w1").on(Device::cpu()).writes(&buf);
            root.task("w2").on(Device::cpu()).writes(&buf);
        })
        .unwrap();

        let dag = resolve(&g, &reg).unwrap();
        let (w1, w2) = (task_node(&dag, 0), task_node(&dag, 1));
        // The structural edge already orders them; no second edge appears.
        let edges: Vec<_> = dag
            .edge_set()
            .into_iter()
            .filter(|(s, t)| *s == w1 && *t == w2)
            .collect();
        assert_eq!(edges.len(), 1);
    }

    #[test]
    fn test_conflict_skipped_when_transitively_ordered() {
        let (reg, buf, _) = registry();
        let mut g = Graph::new("t");
        g.build(|root| {
            root.task("w1").on(Device::cpu()).writes(&buf);
            root.task("mid").on(Device::cpu());
            root.task("w2").on(Device::cpu()).writes(&buf);
        })
        .unwrap();

        let dag = resolve(&g, &reg).unwrap();
        let (w1, w2) = (task_node(&dag, 0), task_node(&dag, 2));
        // Transitive order through mid; no direct data edge is added.
        assert!(!dag.has_edge(w1, w2));
        assert!(dag.reachable(w1, w2));
    }

    #[test]
    fn test_explicit_after_edge() {
        let (reg, _, _) = registry();
        let mut g = Graph::new("t");
        g.build(|root| {
            root.par(|p| {
                let first = p.task("first").on(Device::cpu()).handle();
                p.task("second").on(Device::cpu()).after(first);
            });
        })
        .unwrap();

        let dag = resolve(&g, &reg).unwrap();
        let (a, b) = (task_node(&dag, 0), task_node(&dag, 1));
        assert!(dag.has_edge(a, b));
    }
}

#[cfg(test)]
mod branch_tests {
    use super::*;

    #[test]
    fn test_dynamic_branch_select_and_join() {
        let (reg, _, pred) = registry();
        let mut g = Graph::new("t");
        g.build(|root| {
            root.if_(
                Predicate::Device(pred),
                |then| {
                    then.task("a").on(Device::cpu());
                },
                |els| {
                    els.task("b").on(Device::cpu());
                },
            );
        })
        .unwrap();

        let dag = resolve(&g, &reg).unwrap();
        assert_eq!(dag.selects().len(), 1);
        let info = &dag.selects()[0];
        let (a, b) = (task_node(&dag, 0), task_node(&dag, 1));
        assert!(dag.has_edge(info.node, a));
        assert!(dag.has_edge(info.node, b));
        assert!(info.then_members.contains(&a));
        assert!(info.else_members.contains(&b));

        // Both arm entries carry guard tags pointing at the select.
        let (sa, arm_a) = dag.node(a).guard().unwrap();
        let (sb, arm_b) = dag.node(b).guard().unwrap();
        assert_eq!(sa, info.node);
        assert_eq!(sb, info.node);
        assert_ne!(arm_a, arm_b);
    }

    #[test]
    fn test_select_reads_predicate_producer() {
        let (reg, _, pred) = registry();
        let mut g = Graph::new("t");
        g.build(|root| {
            root.par(|p| {
                p.task("produce").on(Device::cpu()).writes(&pred);
                p.if_(
                    Predicate::Device(pred),
                    |then| {
                        then.task("a").on(Device::cpu());
                    },
                    |els| {
                        els.task("b").on(Device::cpu());
                    },
                );
            });
        })
        .unwrap();

        let dag = resolve(&g, &reg).unwrap();
        let producer = task_node(&dag, 0);
        let select = dag.selects()[0].node;
        // The select's predicate read conflicts with the producer's write.
        assert!(dag.has_edge(producer, select));
    }

    #[test]
    fn test_branch_exits_feed_one_join() {
        let (reg, _, pred) = registry();
        let mut g = Graph::new("t");
        g.build(|root| {
            root.if_(
                Predicate::Device(pred),
                |then| {
                    then.task("a").on(Device::cpu());
                },
                |els| {
                    els.task("b").on(Device::cpu());
                },
            );
            root.task("tail").on(Device::cpu());
        })
        .unwrap();

        let dag = resolve(&g, &reg).unwrap();
        let tail = task_node(&dag, 2);
        let preds = dag.node(tail).preds();
        assert_eq!(preds.len(), 1);
        assert!(matches!(dag.node(preds[0]).kind(), NodeKind::Join));
        let join = preds[0];
        assert!(dag.has_edge(task_node(&dag, 0), join));
        assert!(dag.has_edge(task_node(&dag, 1), join));
    }

    #[test]
    fn test_branch_with_empty_arm() {
        let (reg, _, pred) = registry();
        let mut g = Graph::new("t");
        g.build(|root| {
            root.if_(
                Predicate::Device(pred),
                |then| {
                    then.task("a").on(Device::cpu());
                },
                |_| {},
            );
        })
        .unwrap();

        let dag = resolve(&g, &reg).unwrap();
        let info = &dag.selects()[0];
        assert!(info.else_members.is_empty());
        // The join still waits for the select itself.
        let join = dag
            .nodes()
            .iter()
            .find(|n| matches!(n.kind(), NodeKind::Join))
            .unwrap()
            .id();
        assert!(dag.has_edge(info.node, join));
    }
}

#[cfg(test)]
mod error_tests {
    use super::*;

    #[test]
    fn test_unbound_device() {
        let (reg, _, _) = registry();
        let mut g = Graph::new("t");
        g.build(|root| {
            root.task("floating");
        })
        .unwrap();

        let err = resolve(&g, &reg).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::UnboundDevice { task, .. } if task == TaskHandle(0)
        ));
    }

    #[test]
    fn test_dangling_resource() {
        let (reg, _, _) = registry();
        let stray = View::new(crate::resource::ResourceId(99), 0, 1);
        let mut g = Graph::new("t");
        g.build(|root| {
            root.task("loose").on(Device::cpu()).reads(&stray);
        })
        .unwrap();

        let err = resolve(&g, &reg).unwrap_err();
        assert!(matches!(err, RuntimeError::DanglingResource { .. }));
    }

    #[test]
    fn test_after_cycle_detected() {
        let (reg, _, _) = registry();
        let mut g = Graph::new("t");
        g.build(|root| {
            let a = root.task("a").on(Device::cpu()).handle();
            let b = root.task("b").on(Device::cpu()).handle();
            // Structural order a -> b plus explicit b -> ... -> a closes a
            // cycle.
            root.task_mut(a).unwrap().after(b);
        })
        .unwrap();

        let err = resolve(&g, &reg).unwrap_err();
        assert!(matches!(err, RuntimeError::CycleDetected));
    }

    #[test]
    fn test_device_body_mismatch() {
        let (reg, _, _) = registry();
        let mut g = Graph::new("t");
        g.build(|root| {
            root.task("confused").on(Device::cuda(0)).cpu(|| Ok(()));
        })
        .unwrap();

        let err = resolve(&g, &reg).unwrap_err();
        assert!(matches!(err, RuntimeError::UnboundDevice { .. }));
    }
}

#[cfg(test)]
mod dag_tests {
    use super::*;

    #[test]
    fn test_topological_order_respects_edges() {
        let (reg, buf, _) = registry();
        let mut g = Graph::new("t");
        g.build(|root| {
            root.task("a").on(Device::cpu()).writes(&buf);
            root.par(|p| {
                p.task("b").on(Device::cpu()).reads(&buf);
                p.task("c").on(Device::cpu()).reads(&buf);
            });
        })
        .unwrap();

        let dag = resolve(&g, &reg).unwrap();
        let order = dag.topological_order().unwrap();
        assert_eq!(order.len(), dag.num_nodes());
        let pos =
            |n: NodeId| order.iter().position(|&x| x == n).unwrap();
        let (a, b, c) = (task_node(&dag, 0), task_node(&dag, 1), task_node(&dag, 2));
        assert!(pos(a) < pos(b));
        assert!(pos(a) < pos(c));
    }

    #[test]
    fn test_roots_and_leaves() {
        let (reg, _, _) = registry();
        let mut g = Graph::new("t");
        g.build(|root| {
            root.task("head").on(Device::cpu());
            root.task("tail").on(Device::cpu());
        })
        .unwrap();

        let dag = resolve(&g, &reg).unwrap();
        assert_eq!(dag.roots(), vec![task_node(&dag, 0)]);
        assert_eq!(dag.leaves(), vec![task_node(&dag, 1)]);
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let build = |g: &mut Graph| {
            g.build(|root| {
                root.par(|p| {
                    p.task("w1")
                        .on(Device::cpu())
                        .writes(&View::new(crate::resource::ResourceId(0), 0, 16));
                    p.task("w2")
                        .on(Device::cpu())
                        .writes(&View::new(crate::resource::ResourceId(0), 4, 4));
                    p.task("r")
                        .on(Device::cpu())
                        .reads(&View::new(crate::resource::ResourceId(0), 0, 8));
                });
                root.loop_(3, LoopOptions::parallel(2), |it| {
                    it.task("body").on(Device::cpu());
                });
            })
            .unwrap();
        };
        let (reg, _, _) = registry();

        let mut g1 = Graph::new("t");
        build(&mut g1);
        let mut g2 = Graph::new("t");
        build(&mut g2);

        let d1 = resolve(&g1, &reg).unwrap();
        let d2 = resolve(&g2, &reg).unwrap();
        assert_eq!(d1.edge_set(), d2.edge_set());
        assert_eq!(d1.num_nodes(), d2.num_nodes());
    }

    #[test]
    fn test_frozen_after_resolve() {
        let (reg, _, _) = registry();
        let mut g = Graph::new("t");
        g.build(|root| {
            root.task("a").on(Device::cpu());
        })
        .unwrap();
        let dag = resolve(&g, &reg).unwrap();
        assert!(dag.is_frozen());
    }

    #[test]
    fn test_dump_json_names_nodes() {
        let (reg, _, _) = registry();
        let mut g = Graph::new("t");
        g.build(|root| {
            root.task("alpha").on(Device::cpu());
        })
        .unwrap();
        let dag = resolve(&g, &reg).unwrap();
        let dump = dag.dump_json();
        assert!(dump.contains("alpha"));
        assert!(dump.contains("task"));
    }
}
