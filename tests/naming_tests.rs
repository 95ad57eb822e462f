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

use std::collections::HashSet;
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

#[test]
fn empty_name_fails_invalid_name() -> anyhow::Result<()> {
    initialize_tracing();
    let system = ActorSystem::launch("naming", |_| {})?;
    let result = system.spawn(Naming::named(""), Props::default(), sink);
    assert!(matches!(result.unwrap_err(), SpawnError::InvalidName(_)));
    system.shutdown();
    Ok(())
}

#[test]
fn bad_characters_fail_invalid_name() -> anyhow::Result<()> {
    initialize_tracing();
    let system = ActorSystem::launch("naming", |_| {})?;
    for name in ["has space", "sla/sh", "$reserved", "dotted.name"] {
        let result = system.spawn(Naming::named(name), Props::default(), sink);
        assert!(
            matches!(result.unwrap_err(), SpawnError::InvalidName(_)),
            "{name:?} should be rejected"
        );
    }
    system.shutdown();
    Ok(())
}

#[test]
fn non_receive_initial_behaviors_are_rejected() -> anyhow::Result<()> {
    initialize_tracing();
    let system = ActorSystem::launch("bad-start", |_| {})?;
    for (name, factory) in [
        ("same", Behavior::<String>::same as fn() -> Behavior<String>),
        ("stopped", Behavior::<String>::stopped),
        ("failed", || Behavior::failed("refused to start")),
    ] {
        let result = system.spawn(Naming::named(name), Props::default(), factory);
        assert!(
            matches!(result.unwrap_err(), SpawnError::InvalidInitialBehavior),
            "{name} must not be a legal initial behavior"
        );
    }
    system.shutdown();
    Ok(())
}

#[test]
fn duplicate_sibling_name_fails() -> anyhow::Result<()> {
    initialize_tracing();
    let system = ActorSystem::launch("naming", |_| {})?;
    system.spawn(Naming::named("solo"), Props::default(), sink)?;
    let result = system.spawn(Naming::named("solo"), Props::default(), sink);
    assert!(matches!(
        result.unwrap_err(),
        SpawnError::NameAlreadyInUse(name) if name == "solo"
    ));
    system.shutdown();
    Ok(())
}

/// One hundred concurrent spawns of the same explicit name yield exactly
/// one success and ninety-nine `NameAlreadyInUse`.
#[test]
fn concurrent_name_collision_has_one_winner() -> anyhow::Result<()> {
    initialize_tracing();
    let system = Arc::new(ActorSystem::launch("collide", |_| {})?);
    let successes = Arc::new(AtomicU32::new(0));
    let collisions = Arc::new(AtomicU32::new(0));
    let threads: Vec<_> = (0..100)
        .map(|_| {
            let system = system.clone();
            let successes = successes.clone();
            let collisions = collisions.clone();
            std::thread::spawn(move || {
                match system.spawn(Naming::named("highlander"), Props::default(), sink) {
                    Ok(_) => successes.fetch_add(1, Ordering::SeqCst),
                    Err(SpawnError::NameAlreadyInUse(_)) => {
                        collisions.fetch_add(1, Ordering::SeqCst)
                    }
                    Err(other) => panic!("unexpected spawn error: {other}"),
                };
            })
        })
        .collect();
    for thread in threads {
        thread.join().unwrap();
    }
    assert_eq!(successes.load(Ordering::SeqCst), 1);
    assert_eq!(collisions.load(Ordering::SeqCst), 99);
    system.shutdown();
    Ok(())
}

#[test]
fn anonymous_names_are_unique_and_tagged() -> anyhow::Result<()> {
    initialize_tracing();
    let system = ActorSystem::launch("anon", |_| {})?;
    let mut names = HashSet::new();
    for _ in 0..10 {
        let actor = system.spawn(Naming::anonymous("worker"), Props::default(), sink)?;
        let name = actor.address().name().to_string();
        assert!(name.starts_with("worker-$"), "{name}");
        assert!(names.insert(name));
    }
    system.shutdown();
    Ok(())
}

/// A name becomes reusable once the live child is gone; the respawn gets
/// a fresh incarnation, so the old rendered address no longer resolves.
#[test]
fn name_reuse_after_termination_changes_incarnation() -> anyhow::Result<()> {
    initialize_tracing();
    let system = ActorSystem::launch("reuse", |_| {})?;
    let first = system.spawn(Naming::named("phoenix"), Props::default(), || {
        Behavior::receive(|_, _: String| Behavior::stopped())
    })?;
    let first_rendered = first.address().to_string();
    first.tell("die".to_string());
    assert!(await_condition(Duration::from_secs(5), || {
        system
            .spawn(Naming::named("phoenix"), Props::default(), sink)
            .is_ok()
    }));
    let second = system.resolve::<String>("/user/phoenix");
    assert!(!second.is_dead_letters());
    // The first incarnation's rendered address is stale now.
    assert!(system.resolve::<String>(&first_rendered).is_dead_letters());
    system.shutdown();
    Ok(())
}

/// `resolve(render(address))` produces a ref bound to that address for
/// every live actor.
#[test]
fn resolve_of_rendered_address_round_trips() -> anyhow::Result<()> {
    initialize_tracing();
    let system = ActorSystem::launch("render", |_| {})?;
    let count = Arc::new(AtomicU32::new(0));
    let actor = {
        let count = count.clone();
        system.spawn(Naming::named("target"), Props::default(), move || {
            let count = count.clone();
            Behavior::receive(move |_, _: String| {
                count.fetch_add(1, Ordering::SeqCst);
                Behavior::same()
            })
        })?
    };
    let rendered = actor.address().to_string();
    let resolved = system.resolve::<String>(&rendered);
    assert!(!resolved.is_dead_letters());
    assert_eq!(resolved.address(), actor.address());
    resolved.tell("hello".to_string());
    assert!(await_condition(Duration::from_secs(5), || {
        count.load(Ordering::SeqCst) == 1
    }));
    system.shutdown();
    Ok(())
}

/// Resolve misses and type mismatches bind to dead letters; sends succeed
/// and are recorded, never delivered.
#[test]
fn resolve_misses_bind_to_dead_letters() -> anyhow::Result<()> {
    initialize_tracing();
    let system = ActorSystem::launch("misses", |_| {})?;
    system.spawn(Naming::named("typed"), Props::default(), sink)?;

    let missing = system.resolve::<String>("/user/nobody-here");
    assert!(missing.is_dead_letters());
    assert_eq!(missing.address().to_string(), "/user/nobody-here");
    let before = system.dead_letters().count();
    missing.tell("void".to_string());
    assert_eq!(system.dead_letters().count(), before + 1);

    let mistyped = system.resolve::<u64>("/user/typed");
    assert!(mistyped.is_dead_letters());

    let garbage = system.resolve::<String>("not-a-path");
    assert!(garbage.is_dead_letters());
    system.shutdown();
    Ok(())
}

/// Well-known actors render without an incarnation tag and resolve by
/// bare path.
#[test]
fn well_known_actors_resolve_by_bare_path() -> anyhow::Result<()> {
    initialize_tracing();
    let system = ActorSystem::launch("well-known", |_| {})?;
    let receptionist = system.receptionist().expect("receptionist installed");
    assert_eq!(receptionist.address().to_string(), "/system/receptionist");
    assert_eq!(
        receptionist.address().incarnation(),
        Incarnation::Perpetual
    );
    let resolved = system.resolve::<SystemServiceMsg>("/system/receptionist");
    assert!(!resolved.is_dead_letters());
    system.shutdown();
    Ok(())
}
