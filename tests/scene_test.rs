use std::sync::Arc;

use cgmath::Vector3;
use hdri_viewer::data_structures::{
    instance::Instance,
    scene::{Scene, SceneNode},
};

use crate::common::test_utils::{FakeEnvironment, FakeNode};

mod common;

#[test]
fn should_start_empty() {
    let scene: Scene<FakeEnvironment, FakeNode> = Scene::default();

    assert!(scene.background().is_none());
    assert!(scene.environment().is_none());
    assert!(scene.children().is_empty());
}

#[test]
fn should_share_environment_with_background() {
    let mut scene: Scene<FakeEnvironment, FakeNode> = Scene::new();

    let installed = scene.set_environment(FakeEnvironment("studio"));

    let background = scene.background().expect("background is set");
    let environment = scene.environment().expect("environment is set");
    assert!(Arc::ptr_eq(background, environment));
    assert!(Arc::ptr_eq(&installed, environment));
}

#[test]
fn should_replace_environment() {
    let mut scene: Scene<FakeEnvironment, FakeNode> = Scene::new();

    let first = scene.set_environment(FakeEnvironment("first"));
    scene.set_environment(FakeEnvironment("second"));

    let environment = scene.environment().expect("environment is set");
    assert!(!Arc::ptr_eq(&first, environment));
    assert_eq!(**environment, FakeEnvironment("second"));
}

#[test]
fn should_keep_children_in_insertion_order() {
    let mut scene: Scene<FakeEnvironment, FakeNode> = Scene::new();

    scene.add(FakeNode::new("a"));
    scene.add(FakeNode::new("b"));

    let names: Vec<_> = scene.children().iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
}

#[test]
fn should_mutate_added_child_in_place() {
    let mut scene: Scene<FakeEnvironment, FakeNode> = Scene::new();

    let node = scene.add(FakeNode::new("helmet"));
    node.update_local_transform(&mut |local| local.scale = Vector3::new(2.0, 2.0, 2.0));

    assert_eq!(
        scene.children()[0].local_transform().scale,
        Vector3::new(2.0, 2.0, 2.0)
    );
    // everything else stays at identity
    assert_eq!(
        scene.children()[0].local_transform().position,
        Instance::new().position
    );

    for child in scene.children_mut() {
        child.set_local_transform(Instance::new());
    }
    assert_eq!(*scene.children()[0].local_transform(), Instance::new());
}
