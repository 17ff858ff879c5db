//! End-to-end scenarios over a whole engine.

use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use world_engine::{
    BookType, CharacterView, Engine, EngineConfig, Rule, RulebookOverrides, Subject, Time,
    WorldError,
};

fn engine() -> Engine {
    Engine::new(EngineConfig::default())
}

fn village(engine: &mut Engine) {
    let mut physical = engine
        .new_character("physical", RulebookOverrides::new())
        .unwrap();
    physical.add_places_from(["home", "market", "field"]).unwrap();
    physical
        .add_portals_from([("home", "market"), ("market", "field")], true)
        .unwrap();
    physical.add_thing("cart", "home", Some("market")).unwrap();
    physical.set_node_stat("cart", "load", json!(3)).unwrap();
}

#[test]
fn test_reclassification_is_rolled_back_with_time() {
    let mut engine = engine();
    village(&mut engine);

    engine.next_turn().unwrap();
    engine
        .character_mut("physical")
        .unwrap()
        .thing_to_place("cart")
        .unwrap();
    engine.next_turn().unwrap();
    engine
        .character_mut("physical")
        .unwrap()
        .place_to_thing("market", "field", None)
        .unwrap();

    let physical = engine.character("physical").unwrap();
    assert_eq!(physical.things().unwrap(), vec!["market"]);
    assert!(physical.has_place("cart").unwrap());
    // stats and portals survive reclassification
    assert_eq!(physical.node_stat("cart", "load").unwrap(), json!(3));
    assert!(physical.has_portal("market", "field").unwrap());

    engine.set_tick(0);
    let physical = engine.character("physical").unwrap();
    assert_eq!(physical.things().unwrap(), vec!["cart"]);
    assert_eq!(physical.location("cart").unwrap(), "home");
    assert_eq!(physical.next_location("cart").unwrap(), Some("market".to_string()));
}

#[test]
fn test_shared_node_rulebook_fires_once_per_node() {
    let mut engine = engine();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    engine.define_trigger("always", |_, _| Ok(true));
    engine.define_action("count", move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(json!(true))
    });
    engine
        .add_rule(Rule::new("tally").with_trigger("always").with_action("count"))
        .unwrap();

    let shared = RulebookOverrides::new().with(BookType::Node, "shared_nodes");
    engine
        .new_character("left", shared.clone())
        .unwrap()
        .add_places_from(["a", "b"])
        .unwrap();
    engine
        .new_character("right", shared)
        .unwrap()
        .add_place("c")
        .unwrap();
    engine
        .character_mut("left")
        .unwrap()
        .follower_mut(BookType::Node)
        .rules_mut()
        .unwrap()
        .activate("tally")
        .unwrap();

    // activation lives on the rulebook, so both characters follow it
    assert!(engine
        .character("right")
        .unwrap()
        .follower(BookType::Node)
        .follows("tally")
        .unwrap());

    let report = engine.next_turn().unwrap();
    assert_eq!(report.fire_count("tally"), 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[test]
fn test_triggers_or_and_prereqs_and() {
    let mut engine = engine();
    village(&mut engine);
    engine.define_trigger("never", |_, _| Ok(false));
    engine.define_trigger("loaded", |engine: &mut Engine, subject: &Subject| {
        let (graph, node) = subject.as_node().unwrap();
        let load = engine.character(graph)?.node_stat(node, "load")?;
        Ok(load.as_i64().unwrap_or(0) > 0)
    });
    engine.define_prereq("yes", |_, _| Ok(true));
    engine.define_prereq("no", |_, _| Ok(false));
    engine.define_action("unload", |engine: &mut Engine, subject: &Subject| {
        let (graph, node) = subject.as_node().unwrap();
        let (graph, node) = (graph.to_string(), node.to_string());
        engine
            .character_mut(&graph)?
            .set_node_stat(&node, "load", json!(0))?;
        Ok(json!(node))
    });

    engine
        .add_rule(
            Rule::new("unload")
                .with_trigger("never")
                .with_trigger("loaded")
                .with_prereq("yes")
                .with_action("unload"),
        )
        .unwrap();
    engine
        .add_rule(
            Rule::new("blocked")
                .with_trigger("loaded")
                .with_prereq("yes")
                .with_prereq("no")
                .with_action("unload"),
        )
        .unwrap();
    {
        let mut physical = engine.character_mut("physical").unwrap();
        let mut follower = physical.follower_mut(BookType::Thing);
        let mut rules = follower.rules_mut().unwrap();
        rules.activate("blocked").unwrap();
        rules.activate("unload").unwrap();
    }

    let report = engine.next_turn().unwrap();
    assert_eq!(report.fire_count("blocked"), 0);
    assert_eq!(report.fire_count("unload"), 1);
    assert_eq!(report.fired[0].results, vec![json!("cart")]);
    assert_eq!(
        engine.character("physical").unwrap().node_stat("cart", "load").unwrap(),
        json!(0)
    );

    // nothing left to unload
    let report = engine.next_turn().unwrap();
    assert!(report.fired.is_empty());
}

#[test]
fn test_rule_functions_cannot_leak_time_changes() {
    let mut engine = engine();
    village(&mut engine);
    engine.define_trigger("wander", |engine: &mut Engine, _| {
        engine.set_tick(0);
        engine.switch_branch("elsewhere")?;
        engine.set_tick(99);
        Ok(true)
    });
    engine.define_action("noop", |_, _| Ok(json!(null)));
    engine
        .add_rule(Rule::new("wanderer").with_trigger("wander").with_action("noop"))
        .unwrap();
    engine
        .character_mut("physical")
        .unwrap()
        .follower_mut(BookType::Character)
        .rules_mut()
        .unwrap()
        .activate("wanderer")
        .unwrap();

    engine.next_turn().unwrap();
    assert_eq!(engine.time(), &Time::new("trunk", 1));
    engine.next_turn().unwrap();
    assert_eq!(engine.time(), &Time::new("trunk", 2));
}

#[test]
fn test_replaying_a_branch_is_deterministic() {
    fn run(engine: &mut Engine) -> Vec<serde_json::Value> {
        let mut loads = Vec::new();
        for _ in 0..4 {
            engine.next_turn().unwrap();
            loads.push(
                engine
                    .character("physical")
                    .unwrap()
                    .node_stat("cart", "load")
                    .unwrap(),
            );
        }
        loads
    }

    let mut engine = engine();
    village(&mut engine);
    engine.define_trigger("always", |_, _| Ok(true));
    engine.define_action("grow", |engine: &mut Engine, subject: &Subject| {
        let (graph, node) = subject.as_node().unwrap();
        let (graph, node) = (graph.to_string(), node.to_string());
        let load = engine.character(&graph)?.node_stat(&node, "load")?;
        let load = load.as_i64().unwrap_or(0) + 1;
        engine
            .character_mut(&graph)?
            .set_node_stat(&node, "load", json!(load))?;
        Ok(json!(load))
    });
    engine
        .add_rule(Rule::new("grow").with_trigger("always").with_action("grow"))
        .unwrap();
    engine
        .character_mut("physical")
        .unwrap()
        .follower_mut(BookType::Thing)
        .rules_mut()
        .unwrap()
        .activate("grow")
        .unwrap();

    let first = run(&mut engine);
    engine.set_tick(0);
    engine.switch_branch("replay").unwrap();
    let second = run(&mut engine);

    assert_eq!(first, second);
    assert_eq!(first, vec![json!(4), json!(5), json!(6), json!(7)]);
}

#[test]
fn test_avatars_follow_node_existence() {
    let mut engine = engine();
    village(&mut engine);
    engine
        .new_character("alice", RulebookOverrides::new())
        .unwrap()
        .add_avatar("physical", "cart")
        .unwrap();
    assert_eq!(
        engine.character("alice").unwrap().avatars().unwrap(),
        vec![("physical".to_string(), "cart".to_string())]
    );

    engine.next_turn().unwrap();
    engine.character_mut("physical").unwrap().del_node("cart").unwrap();

    let alice = engine.character("alice").unwrap();
    assert!(alice.avatars().unwrap().is_empty());
    assert!(alice
        .follower(BookType::Avatar)
        .subjects()
        .unwrap()
        .is_empty());
    assert!(matches!(alice.sole_avatar(), Err(WorldError::NotFound(_))));

    engine.set_tick(0);
    assert_eq!(
        engine.character("alice").unwrap().sole_avatar().unwrap(),
        ("physical".to_string(), "cart".to_string())
    );
}

#[test]
fn test_sense_results_never_touch_the_world() {
    let mut engine = engine();
    village(&mut engine);
    engine.new_character("alice", RulebookOverrides::new()).unwrap();
    engine.define_sense("myopic", |_engine, _observer, mut seen| {
        seen.del_node("field")?;
        seen.set_node_stat("cart", "load", json!("unknown"))?;
        Ok(seen)
    });
    engine
        .character_mut("alice")
        .unwrap()
        .set_sense("sight", "myopic")
        .unwrap();

    let alice = engine.character("alice").unwrap();
    let mut seen = alice.sense("sight", "physical").unwrap();
    assert!(!seen.has_node("field").unwrap());
    assert_eq!(seen.node_stat("cart", "load").unwrap(), json!("unknown"));

    let mut imagined = seen.facade();
    imagined.add_thing("dream", "nowhere", None).unwrap();
    assert!(imagined.has_place("nowhere").unwrap());
    drop(imagined);
    assert!(!seen.has_node("dream").unwrap());

    seen.add_place("field");
    let physical = engine.character("physical").unwrap();
    assert_eq!(physical.node_stat("cart", "load").unwrap(), json!(3));
    assert!(!physical.has_node("nowhere").unwrap());
    assert!(physical.has_node("field").unwrap());
}

#[test]
fn test_file_store_resumes_where_it_left_off() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("world.json");

    {
        let mut engine = Engine::open(EngineConfig::default(), &path).unwrap();
        village(&mut engine);
        engine.next_turn().unwrap();
        engine
            .character_mut("physical")
            .unwrap()
            .set_location("cart", "market")
            .unwrap();
        engine.close().unwrap();
    }

    let mut engine = Engine::open(EngineConfig::default(), &path).unwrap();
    assert_eq!(engine.time(), &Time::new("trunk", 1));
    assert_eq!(
        engine.character("physical").unwrap().location("cart").unwrap(),
        "market"
    );
    assert!(engine.rulebook("physical:character_thing").is_ok());

    engine.next_turn().unwrap();
    assert_eq!(engine.tick(), 2);
    engine.set_tick(0);
    assert_eq!(
        engine.character("physical").unwrap().location("cart").unwrap(),
        "home"
    );
}

#[test]
fn test_uncached_engine_reads_the_same_world() {
    fn observe(engine: &mut Engine) -> (Vec<String>, Vec<String>, serde_json::Value) {
        engine.next_turn().unwrap();
        let mut physical = engine.character_mut("physical").unwrap();
        physical.thing_to_place("cart").unwrap();
        physical.del_portal("market", "field").unwrap();
        engine.set_tick(0);
        let physical = engine.character("physical").unwrap();
        let things = physical.things().unwrap();
        engine.set_tick(1);
        let physical = engine.character("physical").unwrap();
        (
            things,
            physical.successors("market").unwrap(),
            physical.node_stat("cart", "load").unwrap(),
        )
    }

    let mut cached = engine();
    village(&mut cached);
    let mut uncached = Engine::new(EngineConfig {
        caching: false,
        ..EngineConfig::default()
    });
    village(&mut uncached);

    let expected = observe(&mut cached);
    assert_eq!(expected.0, vec!["cart"]);
    assert_eq!(expected.1, vec!["home"]);
    assert_eq!(observe(&mut uncached), expected);
}

#[test]
fn test_moved_thing_keeps_its_old_location_in_the_past() {
    let mut engine = engine();
    {
        let mut physical = engine
            .new_character("physical", RulebookOverrides::new())
            .unwrap();
        physical.add_places_from(["A", "B"]).unwrap();
        physical.add_portal("A", "B", false).unwrap();
        physical.add_thing("t", "A", None).unwrap();
    }
    for _ in 0..5 {
        engine.next_turn().unwrap();
    }
    engine
        .character_mut("physical")
        .unwrap()
        .set_location("t", "B")
        .unwrap();

    for tick in [5, 6] {
        engine.set_tick(tick);
        let physical = engine.character("physical").unwrap();
        assert!(physical.has_thing("t").unwrap());
        assert!(!physical.has_place("t").unwrap());
        assert_eq!(physical.location("t").unwrap(), "B");
        assert_eq!(physical.contents("B").unwrap(), vec!["t"]);
    }
    engine.set_tick(4);
    assert_eq!(
        engine.character("physical").unwrap().location("t").unwrap(),
        "A"
    );
}

#[test]
fn test_parent_cannot_rewrite_what_a_fork_inherited() {
    let mut engine = engine();
    engine
        .new_character("physical", RulebookOverrides::new())
        .unwrap()
        .add_place("A")
        .unwrap();
    engine
        .character_mut("physical")
        .unwrap()
        .set_node_stat("A", "hp", json!(1))
        .unwrap();

    engine.set_tick(5);
    engine.switch_branch("alt").unwrap();
    let hp_on_alt = |engine: &Engine| engine.character("physical").unwrap().node_stat("A", "hp").unwrap();
    assert_eq!(hp_on_alt(&engine), json!(1));

    for tick in [3, 5] {
        engine.set_time(Time::new("trunk", tick)).unwrap();
        assert!(matches!(
            engine
                .character_mut("physical")
                .unwrap()
                .set_node_stat("A", "hp", json!(99)),
            Err(WorldError::Corruption(_))
        ));
    }
    engine.set_tick(3);
    assert!(matches!(engine.next_turn(), Err(WorldError::Corruption(_))));

    // trunk carries on past the fork without touching alt
    engine.set_tick(5);
    engine.next_turn().unwrap();
    assert_eq!(engine.time(), &Time::new("trunk", 6));
    engine
        .character_mut("physical")
        .unwrap()
        .set_node_stat("A", "hp", json!(99))
        .unwrap();
    engine.set_time(Time::new("alt", 5)).unwrap();
    assert_eq!(hp_on_alt(&engine), json!(1));
    engine.set_tick(9);
    assert_eq!(hp_on_alt(&engine), json!(1));
}
