// Integration tests: sandbox state seen by helper threads spawned from a render.

use std::sync::Arc;

use caret_sandbox::{CodeSecurityManager, Sandbox, SandboxError};

#[test]
fn test_helper_thread_stays_sandboxed() {
    let sandbox = Sandbox::new(Arc::new(CodeSecurityManager::new("k")));

    let (parent_restricted, child_mode, child_restricted) = sandbox
        .render(|ctx| {
            ctx.enter_restricted_zone("k")?;
            let child = ctx.inherit();
            let (mode, restricted) = std::thread::scope(|scope| {
                scope
                    .spawn(move || {
                        let mut child = child;
                        let mode = child.sandbox_mode();
                        child.enter_restricted_zone("k")?;
                        let restricted = child.is_restricted();
                        child.leave_current_zone("k")?;
                        Ok::<_, SandboxError>((mode, restricted))
                    })
                    .join()
                    .expect("helper thread panicked")
            })?;
            let parent = ctx.is_restricted();
            ctx.leave_current_zone("k")?;
            Ok((parent, mode, restricted))
        })
        .unwrap();

    assert!(parent_restricted);
    assert!(child_mode);
    assert!(child_restricted);
}

#[test]
fn test_helper_thread_outside_sandbox() {
    let sandbox = Sandbox::new(Arc::new(CodeSecurityManager::new("k")));
    let child = sandbox.context().inherit();

    let restricted = std::thread::spawn(move || {
        let mut child = child;
        child.enter_restricted_zone("k").unwrap();
        child.is_restricted()
    })
    .join()
    .unwrap();

    assert!(!restricted);
}

#[test]
fn test_helper_thread_failure_aborts_render() {
    let sandbox = Sandbox::new(Arc::new(CodeSecurityManager::new("k")));

    let result: Result<(), SandboxError> = sandbox.render(|ctx| {
        let child = ctx.inherit();
        std::thread::scope(|scope| {
            scope
                .spawn(move || {
                    let mut child = child;
                    child.leave_current_zone("k")
                })
                .join()
                .expect("helper thread panicked")
        })
    });

    assert_eq!(result, Err(SandboxError::EmptyZoneStack));
}
