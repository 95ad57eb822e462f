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

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arbor::prelude::*;
use arbor::SystemServiceMsg;

use crate::setup::{await_condition, initialize_tracing};

mod setup;

fn sink() -> Behavior<String> {
    Behavior::receive(|_, _: String| Behavior::same())
}

/// Dead-lettering after shutdown: a send on a previously live ref is
/// absorbed and recorded, with no crash.
#[test]
fn send_after_shutdown_is_dead_lettered() -> anyhow::Result<()> {
    initialize_tracing();
    let system = ActorSystem::launch("late-send", |_| {})?;
    let actor = system.spawn(Naming::named("closed-soon"), Props::default(), sink)?;
    system.shutdown();
    assert_eq!(system.state(), SystemState::Terminated);
    let before = system.dead_letters().count();
    actor.tell("late".to_string());
    assert_eq!(system.dead_letters().count(), before + 1);
    Ok(())
}

/// Shutdown is synchronous and idempotent; lifecycle transitions are
/// one-way.
#[test]
fn shutdown_twice_is_a_no_op() -> anyhow::Result<()> {
    initialize_tracing();
    let system = ActorSystem::launch("twice", |_| {})?;
    assert_eq!(system.state(), SystemState::Running);
    system.shutdown();
    assert_eq!(system.state(), SystemState::Terminated);
    system.shutdown();
    assert_eq!(system.state(), SystemState::Terminated);
    Ok(())
}

/// Spawning after shutdown has begun fails with `Shutdown`.
#[test]
fn spawn_after_shutdown_fails() -> anyhow::Result<()> {
    initialize_tracing();
    let system = ActorSystem::launch("no-spawns", |_| {})?;
    system.shutdown();
    let result = system.spawn(Naming::named("too-late"), Props::default(), sink);
    assert!(matches!(result.unwrap_err(), SpawnError::Shutdown));
    Ok(())
}

/// Shutdown drains the trees: actors stop, resolution returns dead
/// letters, and the receptionist is rebound to a safe sink.
#[test]
fn shutdown_drains_trees_and_rebinds_receptionist() -> anyhow::Result<()> {
    initialize_tracing();
    let system = ActorSystem::launch("drain", |_| {})?;
    let processed = Arc::new(AtomicU32::new(0));
    for index in 0..5 {
        let processed = processed.clone();
        system.spawn(
            Naming::named(format!("worker-{index}")),
            Props::default(),
            move || {
                let processed = processed.clone();
                Behavior::receive(move |_, _: String| {
                    processed.fetch_add(1, Ordering::SeqCst);
                    Behavior::same()
                })
            },
        )?;
    }
    for index in 0..5 {
        system
            .resolve::<String>(&format!("/user/worker-{index}"))
            .tell("work".to_string());
    }
    assert!(await_condition(Duration::from_secs(5), || {
        processed.load(Ordering::SeqCst) == 5
    }));
    system.shutdown();

    assert!(system.resolve::<String>("/user/worker-0").is_dead_letters());
    let receptionist = system.receptionist().expect("receptionist slot rebound");
    assert!(receptionist.is_dead_letters());
    let before = system.dead_letters().count();
    receptionist.tell(SystemServiceMsg::Ping);
    assert_eq!(system.dead_letters().count(), before + 1);
    Ok(())
}

/// Settings loaded from TOML drive the system, including the unbind
/// deadline's 300 ms default being overridable.
#[test]
fn launch_with_toml_settings() -> anyhow::Result<()> {
    initialize_tracing();
    let loaded = SystemSettings::from_toml_str(
        r#"
        [limits]
        worker_threads = 2
        throughput = 10

        [timeouts]
        unbind_timeout_ms = 25
        "#,
    )?;
    let system = ActorSystem::launch("configured", |settings| *settings = loaded.clone())?;
    assert_eq!(system.settings().limits.worker_threads, 2);
    assert_eq!(system.settings().timeouts.unbind_timeout_ms, 25);
    let actor = system.spawn(Naming::named("hello"), Props::default(), sink)?;
    actor.tell("hi".to_string());
    system.shutdown();
    Ok(())
}

/// Invalid settings are rejected before anything is constructed.
#[test]
fn invalid_settings_fail_launch() {
    initialize_tracing();
    let result = ActorSystem::launch("broken", |settings| {
        settings.limits.throughput = 0;
    });
    assert!(matches!(result.unwrap_err(), ConfigError::Invalid(_)));
}

/// Two systems coexist without sharing any state: no ambient globals.
#[test]
fn systems_are_isolated() -> anyhow::Result<()> {
    initialize_tracing();
    let first = ActorSystem::launch("alpha", |_| {})?;
    let second = ActorSystem::launch("beta", |_| {})?;
    first.spawn(Naming::named("only-in-alpha"), Props::default(), sink)?;
    assert!(!first.resolve::<String>("/user/only-in-alpha").is_dead_letters());
    assert!(second.resolve::<String>("/user/only-in-alpha").is_dead_letters());
    first.shutdown();
    // Beta is untouched by alpha's shutdown.
    assert_eq!(second.state(), SystemState::Running);
    second.spawn(Naming::named("still-alive"), Props::default(), sink)?;
    second.shutdown();
    Ok(())
}
