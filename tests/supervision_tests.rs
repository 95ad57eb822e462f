/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */

use std::time::Duration;

use arbor::prelude::*;

use crate::setup::{await_condition, initialize_tracing, EventLog};

mod setup;

fn flaky_behavior(log: EventLog) -> Behavior<String> {
    let signal_log = log.clone();
    Behavior::receive_with_signals(
        move |_, message: String| {
            if message == "boom" {
                panic!("deliberate failure");
            }
            log.record(format!("handled:{message}"));
            Behavior::same()
        },
        move |_, signal| {
            match signal {
                Signal::PreRestart => signal_log.record("pre-restart"),
                Signal::PostRestart => signal_log.record("post-restart"),
                _ => {}
            }
            Behavior::same()
        },
    )
}

fn watcher_behavior(log: EventLog) -> Behavior<String> {
    Behavior::receive_with_signals(
        move |_, _: String| Behavior::same(),
        move |_, signal| {
            if let Signal::Terminated(address) = signal {
                log.record(format!("terminated:{}", address.name()));
            }
            Behavior::same()
        },
    )
}

/// Supervised restart: two failures trigger two restart cycles with
/// backoff, the third message is handled by the restarted behavior, the
/// mailbox survives across restarts, and no watcher sees `Terminated`.
#[test]
fn restart_directive_survives_two_failures() -> anyhow::Result<()> {
    initialize_tracing();
    let system = ActorSystem::launch("restart", |_| {})?;
    let log = EventLog::new();
    let flaky = {
        let log = log.clone();
        system.spawn(
            Naming::named("flaky"),
            Props::default().with_supervision(SupervisorDirective::Restart(
                RestartBackoff::new(Duration::from_millis(10), Duration::from_millis(40))
                    .with_jitter(0.0),
            )),
            move || flaky_behavior(log.clone()),
        )?
    };
    let watcher = {
        let log = log.clone();
        system.spawn(Naming::named("sentinel"), Props::default(), move || {
            watcher_behavior(log.clone())
        })?
    };
    watcher.watch(&flaky);

    flaky.tell("boom".to_string());
    flaky.tell("boom".to_string());
    flaky.tell("ok".to_string());

    assert!(await_condition(Duration::from_secs(5), || {
        log.count_of("handled:ok") == 1
    }));
    assert_eq!(log.count_of("pre-restart"), 2);
    assert_eq!(log.count_of("post-restart"), 2);
    // The restart cycles must not have produced a termination.
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(log.count_of("terminated:flaky"), 0);
    system.shutdown();
    Ok(())
}

/// The stop directive terminates a failed actor; its parent observes a
/// `ChildTerminated` carrying the failure.
#[test]
fn stop_directive_reports_failure_to_parent() -> anyhow::Result<()> {
    initialize_tracing();
    let system = ActorSystem::launch("stop-directive", |_| {})?;
    let log = EventLog::new();
    let parent = {
        let log = log.clone();
        system.spawn(Naming::named("parent"), Props::default(), move || {
            let log = log.clone();
            let signal_log = log.clone();
            Behavior::receive_with_signals(
                move |ctx, message: String| {
                    if message == "setup" {
                        let child = ctx
                            .spawn_child(Naming::named("fragile"), Props::default(), || {
                                Behavior::receive(|_, message: String| {
                                    if message == "boom" {
                                        panic!("fragile failure");
                                    }
                                    Behavior::same()
                                })
                            })
                            .expect("child spawn");
                        child.tell("boom".to_string());
                        log.record("setup-done");
                    }
                    Behavior::same()
                },
                move |_, signal| {
                    if let Signal::ChildTerminated(address, reason) = signal {
                        signal_log.record(format!(
                            "child-terminated:{}:{}",
                            address.name(),
                            match reason {
                                TerminationReason::Normal => "normal",
                                TerminationReason::Failure(_) => "failure",
                            }
                        ));
                    }
                    Behavior::same()
                },
            )
        })?
    };
    parent.tell("setup".to_string());
    assert!(await_condition(Duration::from_secs(5), || {
        log.count_of("child-terminated:fragile:failure") == 1
    }));
    system.shutdown();
    Ok(())
}

/// Escalation re-raises the child's failure as the parent's own; with the
/// parent on the default stop directive, both terminate.
#[test]
fn escalate_directive_fails_the_parent() -> anyhow::Result<()> {
    initialize_tracing();
    let system = ActorSystem::launch("escalate", |_| {})?;
    let log = EventLog::new();
    let parent = {
        system.spawn(Naming::named("carrier"), Props::default(), move || {
            Behavior::receive(move |ctx, message: String| {
                if message == "setup" {
                    let child = ctx
                        .spawn_child(
                            Naming::named("grenade"),
                            Props::default().with_supervision(SupervisorDirective::Escalate),
                            || {
                                Behavior::receive(|_, message: String| {
                                    if message == "boom" {
                                        panic!("escalating failure");
                                    }
                                    Behavior::same()
                                })
                            },
                        )
                        .expect("child spawn");
                    child.tell("boom".to_string());
                }
                Behavior::same()
            })
        })?
    };
    let watcher = {
        let log = log.clone();
        system.spawn(Naming::named("sentinel"), Props::default(), move || {
            watcher_behavior(log.clone())
        })?
    };
    watcher.watch(&parent);
    parent.tell("setup".to_string());
    assert!(await_condition(Duration::from_secs(5), || {
        log.count_of("terminated:carrier") == 1
    }));
    system.shutdown();
    Ok(())
}

/// An exhausted restart budget downgrades to stop.
#[test]
fn restart_limit_exhaustion_stops_the_actor() -> anyhow::Result<()> {
    initialize_tracing();
    let system = ActorSystem::launch("limited", |_| {})?;
    let log = EventLog::new();
    let flaky = {
        let log = log.clone();
        system.spawn(
            Naming::named("flaky"),
            Props::default().with_supervision(SupervisorDirective::Restart(
                RestartBackoff::new(Duration::from_millis(1), Duration::from_millis(4))
                    .with_jitter(0.0)
                    .with_max_restarts(1),
            )),
            move || flaky_behavior(log.clone()),
        )?
    };
    let watcher = {
        let log = log.clone();
        system.spawn(Naming::named("sentinel"), Props::default(), move || {
            watcher_behavior(log.clone())
        })?
    };
    watcher.watch(&flaky);
    flaky.tell("boom".to_string());
    flaky.tell("boom".to_string());
    assert!(await_condition(Duration::from_secs(5), || {
        log.count_of("terminated:flaky") == 1
    }));
    assert_eq!(log.count_of("pre-restart"), 1);
    system.shutdown();
    Ok(())
}

/// A guardian-level escalation is a system-shutdown trigger.
#[test]
fn escalation_at_the_root_shuts_the_system_down() -> anyhow::Result<()> {
    initialize_tracing();
    let system = ActorSystem::launch("doomed", |_| {})?;
    let unstable = system.spawn(
        Naming::named("unstable"),
        Props::default().with_supervision(SupervisorDirective::Escalate),
        || {
            Behavior::receive(|_, message: String| {
                if message == "boom" {
                    panic!("fatal failure");
                }
                Behavior::same()
            })
        },
    )?;
    unstable.tell("boom".to_string());
    assert!(await_condition(Duration::from_secs(10), || {
        system.state() == SystemState::Terminated
    }));
    system.shutdown();
    Ok(())
}

/// An explicit `failed` behavior routes through supervision like a panic.
#[test]
fn failed_behavior_value_triggers_supervision() -> anyhow::Result<()> {
    initialize_tracing();
    let system = ActorSystem::launch("failed-value", |_| {})?;
    let log = EventLog::new();
    let actor = {
        let log = log.clone();
        system.spawn(
            Naming::named("grump"),
            Props::default().with_supervision(SupervisorDirective::Restart(
                RestartBackoff::new(Duration::from_millis(1), Duration::from_millis(4))
                    .with_jitter(0.0),
            )),
            move || {
                let log = log.clone();
                let signal_log = log.clone();
                Behavior::receive_with_signals(
                    move |_, message: String| {
                        if message == "refuse" {
                            return Behavior::failed("refused");
                        }
                        log.record(format!("handled:{message}"));
                        Behavior::same()
                    },
                    move |_, signal| {
                        if matches!(signal, Signal::PostRestart) {
                            signal_log.record("post-restart");
                        }
                        Behavior::same()
                    },
                )
            },
        )?
    };
    actor.tell("refuse".to_string());
    actor.tell("fine".to_string());
    assert!(await_condition(Duration::from_secs(5), || {
        log.count_of("handled:fine") == 1
    }));
    assert_eq!(log.count_of("post-restart"), 1);
    system.shutdown();
    Ok(())
}
