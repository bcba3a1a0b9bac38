mod common;

use common::*;
use std::collections::BTreeMap;
use std::sync::{Arc, Barrier};
use std::thread;
use uuid::Uuid;
use viz_core::{BranchSource, CoreEngineError, ModuleState, TaskResult, WorkflowAction, WorkflowController};

#[test]
fn append_to_empty_branch_completes_inline() {
    let fx = fixture(true);
    let wf = fx.engine.append_workflow_module(&fx.branch_id, create("a")).unwrap().unwrap();
    assert_eq!(wf.len(), 1);
    let module = &wf.modules()[0];
    assert_eq!(module.state(), ModuleState::Success);
    let ts = module.timestamp();
    assert!(ts.started_at.is_some());
    assert!(ts.started_at <= ts.finished_at);
    assert!(module.datasets().contains_key("a"));
    assert_eq!(wf.action(), WorkflowAction::Append);
    assert!(fx.engine.tasks().is_empty());
    assert_eq!(fx.engine.get_branch(&fx.branch_id).unwrap().workflows().len(), 1);
}

#[test]
fn delete_middle_module_skips_unaffected_downstream() {
    let fx = fixture(true);
    let before = fx.build(vec![create("a"), create("b"), derive("a", "c")]);
    assert_eq!(fx.backend.count(), 3);
    let a_ctx = before.modules()[0].datasets();
    let old_c = before.modules()[2].clone();

    let b_id = before.modules()[1].identifier();
    let wf = fx.engine.delete_workflow_module(&fx.branch_id, &b_id).unwrap().unwrap();

    assert_eq!(wf.len(), 2);
    assert_eq!(wf.action(), WorkflowAction::Delete);
    assert!(!wf.is_active());
    assert_eq!(fx.backend.count(), 3, "C must not be dispatched");
    assert!(Arc::ptr_eq(&wf.modules()[0], &before.modules()[0]));
    let c = &wf.modules()[1];
    assert_eq!(c.state(), ModuleState::Success);
    let expected = old_c.provenance().adjust_state(&a_ctx, fx.datastore.as_ref());
    assert_eq!(c.datasets(), expected);
    assert!(!c.datasets().contains_key("b"));
    assert_eq!(c.outputs(), old_c.outputs());
}

#[test]
fn delete_skips_prefix_then_dispatches_first_affected_module() {
    let fx = fixture(false);
    let before = fx.build(vec![create("a"), create("b"), derive("a", "c"), touch("b")]);
    assert_eq!(fx.backend.count(), 4);
    let old_c = before.modules()[2].clone();

    let b_id = before.modules()[1].identifier();
    let wf = fx.engine.delete_workflow_module(&fx.branch_id, &b_id).unwrap().unwrap();

    assert_eq!(wf.len(), 3);
    assert_eq!(wf.action(), WorkflowAction::Delete);
    assert_eq!(fx.states(), vec![ModuleState::Success, ModuleState::Success, ModuleState::Pending]);
    // C se resolvió sin ejecutar; sólo se despacha touch:b
    assert_eq!(fx.backend.count(), 5);
    assert_eq!(fx.backend.labels().last().map(String::as_str), Some("touch:b"));
    assert!(!Arc::ptr_eq(&wf.modules()[1], &old_c));
    assert_eq!(wf.modules()[1].outputs(), old_c.outputs());
    assert!(!wf.modules()[1].datasets().contains_key("b"));

    fx.backend.complete_last();
    assert_eq!(fx.states(), vec![ModuleState::Success, ModuleState::Success, ModuleState::Error]);
    assert_eq!(fx.backend.count(), 5);
    assert!(!fx.head().is_active());
    assert!(fx.engine.tasks().is_empty());
}

#[test]
fn replace_reexecutes_modules_whose_reads_changed() {
    let fx = fixture(true);
    let before = fx.build(vec![create("a"), touch("a"), derive("a", "c")]);
    let old_c_out = before.modules()[2].datasets()["c"].clone();

    let b_id = before.modules()[1].identifier();
    let wf = fx.engine.replace_workflow_module(&fx.branch_id, &b_id, touch("a")).unwrap().unwrap();

    assert_eq!(fx.backend.labels(), vec!["create:a", "touch:a", "derive:c", "touch:a", "derive:c"]);
    assert_eq!(wf.action(), WorkflowAction::Replace);
    assert!(wf.modules().iter().all(|m| m.state() == ModuleState::Success));
    assert_ne!(wf.modules()[2].datasets()["c"], old_c_out);
    assert_eq!(wf.modules()[2].datasets()["a"], wf.modules()[1].datasets()["a"]);
}

#[test]
fn replaced_downstream_goes_pending_then_running() {
    let fx = fixture(false);
    let before = fx.build(vec![create("a"), touch("a"), derive("a", "c")]);
    let b_id = before.modules()[1].identifier();
    let wf = fx.engine.replace_workflow_module(&fx.branch_id, &b_id, touch("a")).unwrap().unwrap();
    assert_eq!(fx.states(), vec![ModuleState::Success, ModuleState::Pending, ModuleState::Pending]);

    fx.backend.complete_last();
    // C fue despachado pero no se ha notificado RUNNING todavía
    assert_eq!(fx.backend.labels().last().map(String::as_str), Some("derive:c"));
    assert_eq!(wf.modules()[2].state(), ModuleState::Pending);
    let exec = fx.backend.last();
    exec.controller.set_running(&exec.task.task_id, None).unwrap();
    assert_eq!(wf.modules()[2].state(), ModuleState::Running);
    fx.backend.complete_last();
    assert_eq!(wf.modules()[2].state(), ModuleState::Success);
}

#[test]
fn insert_skips_downstream_with_unchanged_reads() {
    let fx = fixture(true);
    let before = fx.build(vec![create("a"), derive("a", "b")]);
    let b_id = before.modules()[1].identifier();
    let wf = fx.engine.insert_workflow_module(&fx.branch_id, &b_id, create("x")).unwrap().unwrap();

    assert_eq!(wf.len(), 3);
    assert_eq!(wf.action(), WorkflowAction::Insert);
    assert_eq!(fx.backend.labels(), vec!["create:a", "derive:b", "create:x"]);
    let skipped = &wf.modules()[2];
    assert_eq!(skipped.state(), ModuleState::Success);
    let keys: Vec<_> = skipped.datasets().keys().cloned().collect();
    assert_eq!(keys, vec!["a", "b", "x"]);
    assert_eq!(skipped.datasets()["b"], before.modules()[1].datasets()["b"]);
}

#[test]
fn unknown_provenance_is_always_dispatched() {
    let fx = fixture(true);
    let before = fx.build(vec![create("a"), opaque("z")]);
    // z no lee nada pero su provenance es desconocida
    let a_id = before.modules()[0].identifier();
    let wf = fx.engine.replace_workflow_module(&fx.branch_id, &a_id, create("a")).unwrap().unwrap();
    assert_eq!(fx.backend.labels(), vec!["create:a", "opaque:z", "create:a", "opaque:z"]);
    assert!(wf.modules().iter().all(|m| m.is_success()));

    let wf = fx.engine.delete_workflow_module(&fx.branch_id, &wf.modules()[0].identifier()).unwrap().unwrap();
    assert_eq!(wf.len(), 1);
    assert_eq!(fx.backend.count(), 5);
}

#[test]
fn edits_conflict_while_head_is_active() {
    let fx = fixture(false);
    let wf = fx.engine.append_workflow_module(&fx.branch_id, create("a")).unwrap().unwrap();
    assert!(wf.is_active());
    let a_id = wf.modules()[0].identifier();
    let conflict = CoreEngineError::ActiveWorkflow(fx.branch_id);

    assert_eq!(fx.engine.append_workflow_module(&fx.branch_id, create("b")).unwrap_err(), conflict);
    assert_eq!(fx.engine.insert_workflow_module(&fx.branch_id, &a_id, create("b")).unwrap_err(), conflict);
    assert_eq!(fx.engine.replace_workflow_module(&fx.branch_id, &a_id, create("b")).unwrap_err(), conflict);
    assert_eq!(fx.engine.delete_workflow_module(&fx.branch_id, &a_id).unwrap_err(), conflict);
    assert!(conflict.is_conflict());

    let branch = fx.engine.get_branch(&fx.branch_id).unwrap();
    assert_eq!(branch.workflows().len(), 1);
    assert_eq!(fx.backend.count(), 1);
}

#[test]
fn concurrent_edits_admit_exactly_one() {
    let fx = fixture(false);
    let barrier = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8).map(|i| {
                                    let engine = fx.engine.clone();
                                    let barrier = barrier.clone();
                                    let branch_id = fx.branch_id;
                                    thread::spawn(move || {
                                        barrier.wait();
                                        engine.append_workflow_module(&branch_id, create(&format!("t{i}")))
                                    })
                                })
                                .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results.iter().filter(|r| matches!(r, Ok(Some(_)))).count(), 1);
    assert_eq!(results.iter().filter(|r| matches!(r, Err(CoreEngineError::ActiveWorkflow(_)))).count(), 7);
    assert_eq!(fx.engine.get_branch(&fx.branch_id).unwrap().workflows().len(), 1);
}

#[test]
fn error_cancels_remaining_pending_modules() {
    let fx = fixture(false);
    let before = fx.build(vec![create("a"), touch("a"), touch("a"), derive("a", "d")]);
    let a_id = before.modules()[0].identifier();
    fx.engine.replace_workflow_module(&fx.branch_id, &a_id, fail("boom")).unwrap().unwrap();
    let dispatched = fx.backend.count();
    fx.backend.complete_last();

    assert_eq!(fx.states(),
               vec![ModuleState::Error, ModuleState::Canceled, ModuleState::Canceled, ModuleState::Canceled]);
    assert_eq!(fx.backend.count(), dispatched);
    let head = fx.head();
    assert!(!head.is_active());
    assert_eq!(head.state(), ModuleState::Error);
    assert_eq!(head.modules()[0].outputs().stderr[0].value, "boom");
    assert!(fx.engine.tasks().is_empty());
}

#[test]
fn error_in_the_middle_keeps_successful_prefix() {
    let fx = fixture(true);
    let before = fx.build(vec![create("a"), touch("a"), derive("a", "c")]);
    let b_id = before.modules()[1].identifier();
    fx.engine.replace_workflow_module(&fx.branch_id, &b_id, fail("bad")).unwrap().unwrap();
    assert_eq!(fx.states(), vec![ModuleState::Success, ModuleState::Error, ModuleState::Canceled]);
    assert!(fx.head().modules()[2].datasets().is_empty());
}

#[test]
fn duplicate_success_callback_is_ignored() {
    let fx = fixture(false);
    let wf = fx.engine.append_workflow_module(&fx.branch_id, create("a")).unwrap().unwrap();
    let exec = fx.backend.last();
    assert!(fx.backend.complete(0).is_some());
    let datasets = wf.modules()[0].datasets();

    let again = exec.controller.set_success(&exec.task.task_id, TaskResult::default());
    assert!(again.is_none());
    assert!(exec.controller.set_error(&exec.task.task_id, None, None).is_none());
    assert_eq!(wf.modules()[0].state(), ModuleState::Success);
    assert_eq!(wf.modules()[0].datasets(), datasets);
}

#[test]
fn forward_chain_dispatches_one_module_per_callback() {
    let fx = fixture(false);
    let before = fx.build(vec![create("a"), touch("a"), derive("a", "c")]);
    let a_id = before.modules()[0].identifier();
    fx.engine.replace_workflow_module(&fx.branch_id, &a_id, create("a")).unwrap().unwrap();
    assert_eq!(fx.backend.count(), 4);

    fx.backend.complete_last();
    assert_eq!(fx.backend.count(), 5);
    assert_eq!(fx.states(), vec![ModuleState::Success, ModuleState::Pending, ModuleState::Pending]);

    fx.backend.complete_last();
    assert_eq!(fx.backend.count(), 6);
    assert_eq!(fx.states(), vec![ModuleState::Success, ModuleState::Success, ModuleState::Pending]);

    fx.backend.complete_last();
    assert_eq!(fx.backend.count(), 6);
    assert!(!fx.head().is_active());
    assert_eq!(fx.head().state(), ModuleState::Success);
}

#[test]
fn dispatched_context_is_the_entering_snapshot() {
    let fx = fixture(false);
    fx.build(vec![create("a"), derive("a", "b")]);
    let execs = fx.backend.executed();
    assert!(execs[0].context.is_empty());
    assert_eq!(execs[1].context.keys().cloned().collect::<Vec<_>>(), vec!["a"]);
}

#[test]
fn cancel_exec_cancels_running_and_pending() {
    let fx = fixture(false);
    let before = fx.build(vec![create("a"), touch("a"), touch("a")]);
    let a_id = before.modules()[0].identifier();
    fx.engine.replace_workflow_module(&fx.branch_id, &a_id, create("a")).unwrap().unwrap();
    let exec = fx.backend.last();
    exec.controller.set_running(&exec.task.task_id, None).unwrap();

    let head = fx.engine.cancel_exec(&fx.branch_id).unwrap();
    assert_eq!(fx.states(), vec![ModuleState::Canceled; 3]);
    assert_eq!(*fx.backend.canceled.lock().unwrap(), vec![exec.task.task_id]);
    assert!(!head.is_active());
    // callbacks tardíos no tienen efecto
    assert!(fx.backend.complete_last().is_none());
    assert_eq!(fx.states(), vec![ModuleState::Canceled; 3]);
    assert!(fx.engine.cancel_exec(&fx.branch_id).is_none());
    // la rama vuelve a aceptar ediciones
    assert!(fx.engine.append_workflow_module(&fx.branch_id, create("z")).unwrap().is_some());
}

#[test]
fn canceled_callback_cascades() {
    let fx = fixture(false);
    let before = fx.build(vec![create("a"), touch("a")]);
    let a_id = before.modules()[0].identifier();
    fx.engine.replace_workflow_module(&fx.branch_id, &a_id, create("a")).unwrap().unwrap();
    let exec = fx.backend.last();
    exec.controller.set_canceled(&exec.task.task_id, None, None).unwrap();
    assert_eq!(fx.states(), vec![ModuleState::Canceled, ModuleState::Canceled]);
    assert!(fx.backend.canceled.lock().unwrap().is_empty());
}

#[test]
fn persistence_failure_forces_error_and_stops_chain() {
    let store = Arc::new(SwitchableStore::default());
    let fx = fixture_with_store(false, store.clone());
    let before = fx.build(vec![create("a"), touch("a")]);
    let a_id = before.modules()[0].identifier();
    fx.engine.replace_workflow_module(&fx.branch_id, &a_id, create("a")).unwrap().unwrap();
    let dispatched = fx.backend.count();
    let exec = fx.backend.last();
    exec.controller.set_running(&exec.task.task_id, None).unwrap();

    store.set_failing(true);
    assert!(fx.backend.complete_last().is_some());
    let head = fx.head();
    assert_eq!(head.modules()[0].state(), ModuleState::Error);
    assert!(head.modules()[0].outputs().stderr[0].value.as_str().unwrap().contains("object store unavailable"));
    assert!(!head.is_active());
    assert_eq!(fx.backend.count(), dispatched);
}

#[test]
fn not_found_is_an_empty_result() {
    let fx = fixture(true);
    let wf = fx.build(vec![create("a")]);
    let missing_branch = Uuid::new_v4();
    let missing_module = Uuid::new_v4();
    let a_id = wf.modules()[0].identifier();

    assert!(fx.engine.append_workflow_module(&missing_branch, create("b")).unwrap().is_none());
    assert!(fx.engine.insert_workflow_module(&missing_branch, &a_id, create("b")).unwrap().is_none());
    assert!(fx.engine.insert_workflow_module(&fx.branch_id, &missing_module, create("b")).unwrap().is_none());
    assert!(fx.engine.delete_workflow_module(&fx.branch_id, &missing_module).unwrap().is_none());
    assert!(fx.engine.replace_workflow_module(&fx.branch_id, &missing_module, create("b")).unwrap().is_none());
    assert!(fx.engine.set_success(&Uuid::new_v4(), TaskResult::default()).is_none());
    assert!(fx.engine.set_running(&Uuid::new_v4(), None).is_none());
    assert_eq!(fx.engine.get_branch(&fx.branch_id).unwrap().workflows().len(), 1);
}

#[test]
fn deleting_last_module_needs_no_execution() {
    let fx = fixture(false);
    let before = fx.build(vec![create("a"), create("b")]);
    let dispatched = fx.backend.count();
    let wf = fx.engine.delete_workflow_module(&fx.branch_id, &before.modules()[1].identifier()).unwrap().unwrap();
    assert_eq!(wf.len(), 1);
    assert!(!wf.is_active());
    assert_eq!(fx.backend.count(), dispatched);
    assert_eq!(wf.descriptor().command_id.as_deref(), Some("create"));

    let wf = fx.engine.delete_workflow_module(&fx.branch_id, &wf.modules()[0].identifier()).unwrap().unwrap();
    assert!(wf.is_empty());
    assert_eq!(wf.state(), ModuleState::Success);
}

#[test]
fn history_snapshots_never_change() {
    let fx = fixture(true);
    fx.build(vec![create("a"), touch("a"), derive("a", "c")]);
    let branch = fx.engine.get_branch(&fx.branch_id).unwrap();
    let snapshot: Vec<Vec<Uuid>> = branch.workflows()
                                         .iter()
                                         .map(|w| w.modules().iter().map(|m| m.identifier()).collect())
                                         .collect();
    let head = fx.head();
    fx.engine.replace_workflow_module(&fx.branch_id, &head.modules()[1].identifier(), touch("a")).unwrap();
    fx.engine.delete_workflow_module(&fx.branch_id, &head.modules()[0].identifier()).unwrap();

    let after = branch.workflows();
    assert_eq!(after.len(), snapshot.len() + 2);
    for (old, wf) in snapshot.iter().zip(after.iter()) {
        let ids: Vec<Uuid> = wf.modules().iter().map(|m| m.identifier()).collect();
        assert_eq!(&ids, old);
        assert!(wf.modules().iter().all(|m| m.is_success()));
    }
}

#[test]
fn branch_from_module_shares_prefix() {
    let fx = fixture(true);
    let wf = fx.build(vec![create("a"), touch("a"), derive("a", "c")]);
    let mut props = BTreeMap::new();
    props.insert("name".to_string(), serde_json::json!("experiment"));
    let source = BranchSource { branch_id: fx.branch_id,
                                workflow_id: None,
                                module_id: Some(wf.modules()[1].identifier()) };
    let branch = fx.engine.create_branch(Some(source), props).unwrap().unwrap();

    let head = branch.head().unwrap();
    assert_eq!(head.action(), WorkflowAction::Create);
    assert_eq!(head.len(), 2);
    assert!(Arc::ptr_eq(&head.modules()[0], &wf.modules()[0]));
    assert_eq!(branch.name().as_deref(), Some("experiment"));
    assert_eq!(branch.provenance().source_branch, Some(fx.branch_id));
    assert_eq!(branch.provenance().workflow_id, Some(wf.identifier()));
    assert_eq!(fx.engine.default_branch().unwrap().identifier(), fx.branch_id);

    // editar la rama nueva no toca la original
    fx.engine.append_workflow_module(&branch.identifier(), derive("a", "e")).unwrap().unwrap();
    assert_eq!(fx.head().len(), 3);
    assert_eq!(branch.head().unwrap().len(), 3);
    assert_eq!(branch.workflows().len(), 2);

    let missing = BranchSource { branch_id: Uuid::new_v4(),
                                 workflow_id: None,
                                 module_id: None };
    assert!(fx.engine.create_branch(Some(missing), BTreeMap::new()).unwrap().is_none());
    let empty = fx.engine.create_branch(None, BTreeMap::new()).unwrap().unwrap();
    assert!(empty.head().is_none());
}

#[test]
fn branch_from_active_workflow_is_rejected() {
    let fx = fixture(false);
    fx.engine.append_workflow_module(&fx.branch_id, create("a")).unwrap().unwrap();
    let source = BranchSource { branch_id: fx.branch_id,
                                workflow_id: None,
                                module_id: None };
    assert_eq!(fx.engine.create_branch(Some(source), BTreeMap::new()).unwrap_err(),
               CoreEngineError::ActiveWorkflow(fx.branch_id));
}

#[test]
fn deleting_branches() {
    let fx = fixture(false);
    assert_eq!(fx.engine.delete_branch(&fx.branch_id), Err(CoreEngineError::DefaultBranch(fx.branch_id)));
    let other = fx.engine.create_branch(None, BTreeMap::new()).unwrap().unwrap();
    fx.engine.append_workflow_module(&other.identifier(), create("a")).unwrap().unwrap();
    let task = fx.backend.last().task.task_id;
    let head = other.head().unwrap();
    assert!(head.is_active());
    assert_eq!(fx.engine.delete_branch(&other.identifier()), Ok(true));
    assert_eq!(*fx.backend.canceled.lock().unwrap(), vec![task]);
    assert_eq!(head.modules()[0].state(), ModuleState::Canceled);
    assert!(!head.is_active());
    assert!(fx.engine.tasks().is_empty());
    assert!(fx.backend.complete_last().is_none());
    assert_eq!(fx.engine.delete_branch(&other.identifier()), Ok(false));
}
