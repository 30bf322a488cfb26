use launch_composer::{
    Action, Composer, Composition, Condition, DeclareArgument, Expr, Group, Include,
    LaunchDescription, PackageMap, StartProcess,
};
use std::{collections::HashMap, fs, path::Path, sync::Arc, time::Instant};

fn locator(prefix: &Path) -> Arc<PackageMap> {
    Arc::new(
        ["yolo_bringup", "yolo_ros", "rviz2"]
            .into_iter()
            .fold(PackageMap::new(), |map, pkg| map.with_package(pkg, prefix)),
    )
}

fn commands(composition: &Composition) -> Vec<(String, Vec<String>)> {
    composition
        .directives()
        .iter()
        .map(|d| (d.name.clone(), d.cmd.clone()))
        .collect()
}

fn rviz_config() -> Expr {
    Expr::path_join([
        Expr::package_share("yolo_ros"),
        Expr::literal("rviz"),
        Expr::literal("default.rviz"),
    ])
}

fn detector_description() -> LaunchDescription {
    let node = StartProcess::node("yolo_ros", "yolo_node")
        .with_name("yolo_node")
        .arg("--model")
        .arg(Expr::var("model"));

    LaunchDescription::named("yolo")
        .with_action(DeclareArgument::new("model").with_default("yolov8m.pt"))
        .with_action(DeclareArgument::new("namespace").with_default("yolo"))
        .with_action(DeclareArgument::new("enable").with_default("True"))
        .with_action(
            Action::from(
                Group::new()
                    .with_namespace(Expr::var("namespace"))
                    .with_action(node),
            )
            .when(Condition::If(Expr::var("enable"))),
        )
}

fn top_description() -> LaunchDescription {
    let include = Include::description(Arc::new(detector_description()))
        .with_arg("model", Expr::var("model"))
        .with_arg("enable", "True")
        .with_arg("namespace", "yolo");

    let has_config = || Condition::If(Expr::path_exists(rviz_config()));
    let rviz = StartProcess::node("rviz2", "rviz2")
        .with_name("rviz2")
        .arg_when("-d", has_config())
        .arg_when(rviz_config(), has_config());

    LaunchDescription::named("yolo_rviz")
        .with_action(
            DeclareArgument::new("model")
                .with_default("yolo11n.pt")
                .with_description("YOLO model (n=nano, s=small, m=medium, l=large)"),
        )
        .with_action(include)
        .with_action(rviz)
}

const DETECTOR_XML: &str = r#"<launch>
    <arg name="model" default="yolov8m.pt"/>
    <arg name="namespace" default="yolo"/>
    <arg name="enable" default="True"/>
    <group namespace="$(var namespace)" if="$(var enable)">
        <node pkg="yolo_ros" exec="yolo_node" name="yolo_node" args="--model $(var model)"/>
    </group>
</launch>"#;

const TOP_XML: &str = r#"<launch>
    <arg name="model" default="yolo11n.pt" description="YOLO model (n=nano, s=small, m=medium, l=large)"/>
    <include file="$(find-pkg-share yolo_bringup)/launch/yolo.launch.xml">
        <arg name="model" value="$(var model)"/>
        <arg name="enable" value="True"/>
        <arg name="namespace" value="yolo"/>
    </include>
    <node pkg="rviz2" exec="rviz2" name="rviz2">
        <arg value="-d" if="$(path-exists $(path-join $(find-pkg-share yolo_ros) rviz default.rviz))"/>
        <arg value="$(path-join $(find-pkg-share yolo_ros) rviz default.rviz)" if="$(path-exists $(path-join $(find-pkg-share yolo_ros) rviz default.rviz))"/>
    </node>
</launch>"#;

#[test]
fn test_builder_and_xml_compose_identically() {
    let prefix = tempfile::tempdir().unwrap();
    let launch_dir = prefix.path().join("share/yolo_bringup/launch");
    let rviz_dir = prefix.path().join("share/yolo_ros/rviz");
    fs::create_dir_all(&launch_dir).unwrap();
    fs::create_dir_all(&rviz_dir).unwrap();
    fs::write(launch_dir.join("yolo.launch.xml"), DETECTOR_XML).unwrap();
    fs::write(rviz_dir.join("default.rviz"), "").unwrap();
    let top = prefix.path().join("yolo_rviz.launch.xml");
    fs::write(&top, TOP_XML).unwrap();

    let composer = Composer::new(locator(prefix.path()));
    for overrides in [vec![], vec![("model", "yolo11x.pt")]] {
        let from_xml = composer.compose_file(&top, overrides.clone()).unwrap();
        let from_builder = composer.compose(&top_description(), overrides).unwrap();
        assert_eq!(commands(&from_xml), commands(&from_builder));
    }

    let composition = composer
        .compose(&top_description(), HashMap::<String, String>::new())
        .unwrap();
    let yolo = composition.directive("/yolo/yolo_node").unwrap();
    assert_eq!(yolo.arguments, vec!["--model", "yolo11n.pt"]);
    let rviz = composition.directive("/rviz2").unwrap();
    assert_eq!(
        rviz.arguments,
        vec![
            "-d".to_string(),
            rviz_dir.join("default.rviz").to_string_lossy().into_owned()
        ]
    );
}

#[test]
fn test_shared_description_included_twice() {
    let detector = Arc::new(detector_description());
    let top = LaunchDescription::named("two_cameras")
        .with_action(Include::description(Arc::clone(&detector)).with_arg("namespace", "left"))
        .with_action(Include::description(Arc::clone(&detector)).with_arg("namespace", "right"));

    let composition = Composer::new(Arc::new(PackageMap::new().with_package("yolo_ros", "/opt/yolo")))
        .compose(&top, HashMap::<String, String>::new())
        .unwrap();

    let names: Vec<&str> = composition.directives().iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["/left/yolo_node", "/right/yolo_node"]);
    assert_eq!(composition.arguments_in("yolo").count(), 6);
}

#[test]
fn test_performance_yolo_rviz_fixture() {
    let prefix = tempfile::tempdir().unwrap();
    let launch_dir = prefix.path().join("share/yolo_bringup/launch");
    fs::create_dir_all(&launch_dir).unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/launch");
    fs::copy(fixtures.join("yolo.launch.xml"), launch_dir.join("yolo.launch.xml")).unwrap();
    let top = prefix.path().join("yolo_rviz.launch.xml");
    fs::copy(fixtures.join("yolo_rviz.launch.xml"), &top).unwrap();

    let composer = Composer::new(locator(prefix.path()));
    let iterations = 50;
    let start = Instant::now();
    for _ in 0..iterations {
        let composition = composer
            .compose_file(&top, HashMap::<String, String>::new())
            .unwrap();
        assert_eq!(composition.directives().len(), 4);
    }

    let duration = start.elapsed();
    let avg_ms = duration.as_millis() as f64 / iterations as f64;
    println!("\nPerformance - yolo_rviz composition:");
    println!("  Total time ({} iterations): {:?}", iterations, duration);
    println!("  Average per composition: {:.2}ms", avg_ms);

    assert!(
        avg_ms < 50.0,
        "Composition should be < 50ms, got {:.2}ms",
        avg_ms
    );
}
