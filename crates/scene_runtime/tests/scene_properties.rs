//! End-to-end behavior of the scene runtime

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use scene_runtime::foundation::logging;
use scene_runtime::prelude::*;

type Log = Rc<RefCell<Vec<String>>>;

fn reachable(scene: &Scene) -> BTreeSet<EntityId> {
    let mut out = BTreeSet::new();
    let mut stack = vec![scene.root()];
    while let Some(id) = stack.pop() {
        out.insert(id);
        if let Some(entity) = scene.entity(id) {
            stack.extend(entity.children().iter().copied());
        }
    }
    out
}

fn assert_indices_match_tree(scene: &Scene, all: &[EntityId]) {
    let reachable = reachable(scene);
    let live: BTreeSet<EntityId> = scene.live_entities().into_iter().collect();
    assert_eq!(reachable, live);
    for &id in all {
        let attached = reachable.contains(&id);
        assert_eq!(scene.find_by_id(id).is_some(), attached, "id index for {id}");
        if let Some(entity) = scene.entity(id) {
            let by_tag = scene.find_all_by_tag(entity.tag()).contains(&id);
            assert_eq!(by_tag, attached, "tag index for {id}");
            if !entity.flags().is_empty() {
                let by_flag = scene.find_all_by_flag(entity.flags()).contains(&id);
                assert_eq!(by_flag, attached, "flag index for {id}");
            }
        }
    }
}

#[test]
fn reachable_set_equals_id_index() {
    logging::try_init_for_tests();
    let mut scene = Scene::new();
    let mut rng = StdRng::seed_from_u64(7);
    let mut all = vec![scene.root()];

    for step in 0..400 {
        match rng.gen_range(0..5) {
            0 | 1 => {
                let id = scene.create_entity(format!("t{}", step % 4));
                if rng.gen_bool(0.5) {
                    scene.set_flag(id, EntityFlags::COLLIDABLE);
                }
                all.push(id);
            }
            2 => {
                let child = all[rng.gen_range(0..all.len())];
                let parent = all[rng.gen_range(0..all.len())];
                // structural errors are expected for random pairs
                let _ = scene.add_child(parent, child);
            }
            3 => {
                let parent = all[rng.gen_range(0..all.len())];
                if let Some(&child) = scene.entity(parent).and_then(|p| p.children().first()) {
                    assert!(scene.remove_child(parent, child));
                }
            }
            _ => {
                let id = all[rng.gen_range(0..all.len())];
                scene.invert_flag(id, EntityFlags::PROJECTILE);
            }
        }
        assert_indices_match_tree(&scene, &all);
    }
}

struct Lifecycle {
    log: Log,
}

impl Lifecycle {
    fn push(&self, event: &str) {
        self.log.borrow_mut().push(event.to_string());
    }
}

impl Component for Lifecycle {
    fn on_init(&mut self, ctx: &mut Context<'_>) -> HookResult {
        self.push("init");
        ctx.subscribe(["tick"]);
        Ok(())
    }

    fn on_update(&mut self, ctx: &mut Context<'_>, _delta: f64, absolute: f64) -> HookResult {
        self.push("update");
        if absolute >= 32.0 {
            ctx.finish();
        }
        Ok(())
    }

    fn on_message(&mut self, _ctx: &mut Context<'_>, _msg: &Message) -> HookResult {
        self.push("message");
        Ok(())
    }

    fn on_finish(&mut self, _ctx: &mut Context<'_>) -> HookResult {
        self.push("finish");
        Ok(())
    }

    fn on_remove(&mut self, _ctx: &mut Context<'_>) -> HookResult {
        self.push("remove");
        Ok(())
    }
}

#[test]
fn hooks_fire_in_lifecycle_order() {
    let mut scene = Scene::new();
    let log: Log = Rc::default();
    let root = scene.root();
    let entity = EntityBuilder::new()
        .component(Lifecycle { log: Rc::clone(&log) })
        .build(&mut scene, root)
        .unwrap();

    scene.send_message(&Message::new("tick"));
    scene.tick(16.0, 16.0);
    scene.tick(16.0, 32.0);
    scene.tick(16.0, 48.0);
    scene.destroy_entity(entity);
    scene.destroy_entity(entity);

    assert_eq!(
        *log.borrow(),
        vec!["init", "message", "update", "update", "finish", "remove"]
    );
}

#[test]
fn remove_without_finish_still_delivers_finish_once() {
    let mut scene = Scene::new();
    let log: Log = Rc::default();
    let root = scene.root();
    let id = scene.add_component(root, Lifecycle { log: Rc::clone(&log) }).unwrap();

    assert!(scene.remove_component(id));
    assert!(!scene.remove_component(id));
    assert_eq!(*log.borrow(), vec!["init", "finish", "remove"]);
}

#[test]
fn subscribe_twice_unsubscribe_once() {
    let mut scene = Scene::new();
    let log: Log = Rc::default();
    let root = scene.root();
    let id = scene.add_component(root, Lifecycle { log: Rc::clone(&log) }).unwrap();

    scene.subscribe(id, "ping");
    scene.subscribe(id, "ping");
    scene.unsubscribe(id, "ping");
    assert_eq!(scene.send_message(&Message::new("ping")), 0);
    assert!(scene.subscribers_of(&Action::new("ping")).is_empty());
}

#[test]
fn publish_without_subscribers() {
    let mut scene = Scene::new();
    assert_eq!(scene.send_message(&Message::new("void").with_payload(Payload::Int(3))), 0);
}

struct SelfRemover {
    calls: Rc<RefCell<usize>>,
}

impl Component for SelfRemover {
    fn on_init(&mut self, ctx: &mut Context<'_>) -> HookResult {
        ctx.subscribe(["hit", "echo"]);
        Ok(())
    }

    fn on_message(&mut self, ctx: &mut Context<'_>, _msg: &Message) -> HookResult {
        *self.calls.borrow_mut() += 1;
        ctx.remove_self();
        // republishing after removal must not reach this component again
        ctx.send_message("echo", Payload::Empty);
        Ok(())
    }
}

#[test]
fn self_removal_during_dispatch() {
    let mut scene = Scene::new();
    let root = scene.root();
    let calls = Rc::new(RefCell::new(0));
    let first = scene.add_component(root, SelfRemover { calls: Rc::clone(&calls) }).unwrap();
    let second = scene.add_component(root, SelfRemover { calls: Rc::clone(&calls) }).unwrap();

    // `first` handles "hit" and republishes "echo", which reaches `second`
    assert_eq!(scene.send_message(&Message::new("hit")), 1);
    assert_eq!(*calls.borrow(), 2);
    assert!(!scene.is_attached(first));
    assert!(!scene.is_attached(second));
    assert!(scene.components_of(root).is_empty());
    assert_eq!(scene.send_message(&Message::new("hit")), 0);
}

#[test]
fn delayed_invocation_timing() {
    let mut scene = Scene::new();
    let fired = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&fired);
    scene.invoke_with_delay(1000.0, move |scene| sink.borrow_mut().push(scene.absolute_time()));

    let mut clock = FrameClock::new();
    for _ in 0..60 {
        let (delta, absolute) = clock.advance(16.0);
        scene.tick(delta, absolute);
        if absolute < 1000.0 {
            assert!(fired.borrow().is_empty(), "fired early at {absolute}");
        }
    }
    assert!(fired.borrow().is_empty());

    for _ in 0..10 {
        let (delta, absolute) = clock.advance(16.0);
        scene.tick(delta, absolute);
    }
    // 63 frames of 16 ms is the first tick at or past 1000 ms
    assert_eq!(*fired.borrow(), vec![1008.0]);
    assert_eq!(scene.pending_invocations(), 0);
}

#[test]
fn clear_then_rebuild() {
    let mut scene = Scene::new();
    let log: Log = Rc::default();
    let root = scene.root();
    let old = EntityBuilder::new()
        .tag("x")
        .flag(EntityFlags::COLLIDABLE)
        .component(Lifecycle { log: Rc::clone(&log) })
        .build(&mut scene, root)
        .unwrap();
    let stray = scene.create_entity("x");
    scene.blackboard_mut().insert(42_u32);
    scene.invoke_with_delay(0.0, |_| panic!("cleared invocation must not fire"));

    scene.clear();
    assert_eq!(*log.borrow(), vec!["init", "finish", "remove"]);
    assert_eq!(scene.pending_invocations(), 0);
    assert!(scene.blackboard().get::<u32>().is_none());

    let root = scene.root();
    let fresh = scene.create_entity("x");
    scene.add_child(root, fresh).unwrap();
    assert_eq!(scene.find_first_by_tag("x"), Some(fresh));
    assert_eq!(scene.find_all_by_tag("x"), vec![fresh]);
    for id in [old, stray] {
        assert!(scene.find_by_id(id).is_none());
        assert!(scene.entity(id).is_none());
    }
    assert!(scene.find_all_by_flag(EntityFlags::COLLIDABLE).is_empty());
    assert_eq!(scene.live_count(), 2);
    scene.tick(16.0, 16.0);
}

#[derive(Default)]
struct HitCounter {
    hits: Vec<Message>,
}

impl Component for HitCounter {
    fn on_init(&mut self, ctx: &mut Context<'_>) -> HookResult {
        ctx.subscribe(["hit"]);
        Ok(())
    }

    fn on_message(&mut self, _ctx: &mut Context<'_>, msg: &Message) -> HookResult {
        self.hits.push(msg.clone());
        Ok(())
    }
}

#[test]
fn enemy_hit_scenario() {
    let mut scene = Scene::new();
    let root = scene.root();
    let enemy = EntityBuilder::new()
        .tag("enemy")
        .flag(EntityFlags::COLLIDABLE)
        .component(HitCounter::default())
        .build(&mut scene, root)
        .unwrap();
    assert_eq!(scene.find_all_by_flag(EntityFlags::COLLIDABLE), vec![enemy]);

    assert_eq!(scene.send_message(&Message::new("hit").with_payload(Payload::Int(5))), 1);
    let counter = scene.get_component::<HitCounter>(enemy).unwrap();
    assert_eq!(counter.hits.len(), 1);
    assert_eq!(counter.hits[0].action(), &Action::new("hit"));
    assert_eq!(counter.hits[0].payload().as_int(), Some(5));

    let id = scene.find_component::<HitCounter>(enemy).unwrap();
    assert!(scene.remove_component(id));
    assert_eq!(scene.send_message(&Message::new("hit")), 0);
    assert!(scene.subscribers_of(&Action::new("hit")).is_empty());
    assert!(scene.is_live(enemy));
}
