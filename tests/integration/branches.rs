//! Static pruning and runtime-resolved conditionals.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tiangong::Runtime;

#[test]
fn static_branch_never_builds_the_loser() {
    let rt = Runtime::create();
    let mut g = rt.graph("static");
    let mut else_built = false;
    g.build(|root| {
        root.if_(
            true,
            |then| {
                then.task("only").cpu(|| Ok(()));
            },
            |_| {
                else_built = true;
            },
        );
    })
    .unwrap();

    assert!(!else_built);
    assert_eq!(g.num_tasks(), 1);
    let report = rt.run(&g).unwrap();
    assert_eq!(report.executed, 1);
    assert_eq!(report.skipped, 0);
}

#[test]
fn dynamic_branch_true_skips_else_arm() {
    let rt = Runtime::create();
    let pred = rt.scalar::<bool>("pred");
    pred.set_host(true);

    let then_ran = Arc::new(AtomicBool::new(false));
    let else_ran = Arc::new(AtomicBool::new(false));

    let mut g = rt.graph("dynamic-true");
    g.build(|root| {
        let then_ran = then_ran.clone();
        let else_ran = else_ran.clone();
        root.if_(
            &pred,
            move |then| {
                then.task("then").cpu(move || {
                    then_ran.store(true, Ordering::SeqCst);
                    Ok(())
                });
            },
            move |els| {
                els.task("else").cpu(move || {
                    else_ran.store(true, Ordering::SeqCst);
                    Ok(())
                });
            },
        );
    })
    .unwrap();

    let report = rt.run(&g).unwrap();
    assert!(then_ran.load(Ordering::SeqCst));
    assert!(!else_ran.load(Ordering::SeqCst));
    assert_eq!(report.skipped, 1);
}

#[test]
fn predicate_produced_inside_the_graph() {
    // The select must wait for the producing task before reading.
    let rt = Runtime::create();
    let pred = rt.scalar::<bool>("computed");
    let chosen = Arc::new(AtomicBool::new(false));

    let mut g = rt.graph("computed-pred");
    g.build(|root| {
        let writer = pred.clone();
        root.task("decide").writes(&pred).cpu(move || {
            writer.set_host(true);
            Ok(())
        });
        let chosen = chosen.clone();
        root.if_(
            &pred,
            move |then| {
                then.task("winner").cpu(move || {
                    chosen.store(true, Ordering::SeqCst);
                    Ok(())
                });
            },
            |els| {
                els.task("loser").cpu(|| Ok(()));
            },
        );
    })
    .unwrap();

    let report = rt.run(&g).unwrap();
    assert!(chosen.load(Ordering::SeqCst));
    assert_eq!(report.skipped, 1);
}

#[test]
fn work_after_the_branch_runs_either_way() {
    let rt = Runtime::create();
    let pred = rt.scalar::<bool>("pred");
    pred.set_host(false);
    let tail_ran = Arc::new(AtomicBool::new(false));

    let mut g = rt.graph("tail");
    g.build(|root| {
        root.if_(
            &pred,
            |then| {
                then.task("then").cpu(|| Ok(()));
            },
            |els| {
                els.task("else").cpu(|| Ok(()));
            },
        );
        let tail_ran = tail_ran.clone();
        root.task("tail").cpu(move || {
            tail_ran.store(true, Ordering::SeqCst);
            Ok(())
        });
    })
    .unwrap();

    rt.run(&g).unwrap();
    assert!(tail_ran.load(Ordering::SeqCst));
}

#[test]
fn nested_dynamic_branches_skip_transitively() {
    let rt = Runtime::create();
    let outer = rt.scalar::<bool>("outer");
    let inner = rt.scalar::<bool>("inner");
    outer.set_host(false);
    inner.set_host(true);

    let inner_ran = Arc::new(AtomicBool::new(false));

    let mut g = rt.graph("nested");
    g.build(|root| {
        let inner_ran = inner_ran.clone();
        let inner_pred = inner.clone();
        root.if_(
            &outer,
            move |then| {
                then.if_(
                    &inner_pred,
                    move |tt| {
                        tt.task("deep").cpu(move || {
                            inner_ran.store(true, Ordering::SeqCst);
                            Ok(())
                        });
                    },
                    |_| {},
                );
            },
            |els| {
                els.task("else").cpu(|| Ok(()));
            },
        );
    })
    .unwrap();

    let report = rt.run(&g).unwrap();
    // The inner branch sits behind the unchosen outer arm; its select never
    // resolves and everything inside is skipped.
    assert!(!inner_ran.load(Ordering::SeqCst));
    assert_eq!(report.executed, 1);
}
