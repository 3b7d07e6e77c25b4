use super::*;

fn declare_layers(console: &mut Console) {
    run(
        console,
        vec![
            function("pkgWho", &[], vec![ret(text("orig"))]),
            package_fn("PkgLayerA", None, "pkgWho", &[], vec![ret(text("a"))]),
            package_fn(
                "PkgLayerA",
                None,
                "pkgChain",
                &[],
                vec![ret(concat(text("a+"), parent_call("pkgWho", vec![])))],
            ),
            package_fn("PkgLayerB", None, "pkgWho", &[], vec![ret(text("b"))]),
        ],
    );
}

#[test]
fn declaring_a_package_does_not_activate_it() {
    let mut console = Console::new();
    declare_layers(&mut console);
    assert!(console.is_package("PkgLayerA"));
    assert!(!console.is_package("PkgNeverDeclared"));
    assert_eq!(console.execute(&["pkgWho"]), "orig");
    assert!(!console.is_function(None, "pkgChain"));
}

#[test]
fn activation_stacks_and_deactivation_restores() {
    let mut console = Console::new();
    declare_layers(&mut console);

    console.activate_package("PkgLayerA").unwrap();
    assert_eq!(console.execute(&["pkgWho"]), "a");
    console.activate_package("PkgLayerB").unwrap();
    assert_eq!(console.execute(&["pkgWho"]), "b");

    assert!(console.deactivate_package("PkgLayerB"));
    assert_eq!(console.execute(&["pkgWho"]), "a");
    assert!(console.deactivate_package("PkgLayerA"));
    assert_eq!(console.execute(&["pkgWho"]), "orig");
    assert!(!console.deactivate_package("PkgLayerA"));
}

#[test]
fn deactivating_an_inner_package_drops_later_ones() {
    let mut console = Console::new();
    declare_layers(&mut console);
    console.activate_package("PkgLayerA").unwrap();
    console.activate_package("PkgLayerB").unwrap();

    assert!(console.deactivate_package("PkgLayerA"));
    assert!(console.namespaces().active_packages().is_empty());
    assert_eq!(console.execute(&["pkgWho"]), "orig");
}

#[test]
fn activating_twice_is_a_no_op() {
    let mut console = Console::new();
    declare_layers(&mut console);
    console.activate_package("PkgLayerA").unwrap();
    console.activate_package("PkgLayerA").unwrap();
    assert_eq!(console.namespaces().active_packages().len(), 1);
    assert!(console.deactivate_package("PkgLayerA"));
    assert_eq!(console.execute(&["pkgWho"]), "orig");
}

#[test]
fn parent_reaches_the_overridden_function() {
    let mut console = Console::new();
    declare_layers(&mut console);
    console.activate_package("PkgLayerA").unwrap();
    assert_eq!(console.execute(&["pkgChain"]), "a+orig");
    assert_eq!(run(&mut console, vec![ret(call("pkgChain", vec![]))]), "a+orig");
}

#[test]
fn cached_call_sites_follow_package_changes() {
    let mut console = Console::new();
    declare_layers(&mut console);
    let unit = console
        .compile(Some("pkg_cache.cs"), &Program::new(vec![ret(call("pkgWho", vec![]))]))
        .unwrap();

    assert_eq!(console.run_unit(&unit), "orig");
    assert_eq!(console.run_unit(&unit), "orig");
    console.activate_package("PkgLayerB").unwrap();
    assert_eq!(console.run_unit(&unit), "b");
    console.activate_package("PkgLayerA").unwrap();
    assert_eq!(console.run_unit(&unit), "a");
    console.deactivate_package("PkgLayerB");
    assert_eq!(console.run_unit(&unit), "orig");
    assert_balanced(&console);
}

#[test]
fn redefinition_invalidates_cached_call_sites() {
    let mut console = Console::new();
    run(&mut console, vec![function("pkgRedef", &[], vec![ret(text("one"))])]);
    let unit = console
        .compile(None, &Program::new(vec![ret(call("pkgRedef", vec![]))]))
        .unwrap();
    assert_eq!(console.run_unit(&unit), "one");
    run(&mut console, vec![function("pkgRedef", &[], vec![ret(text("two"))])]);
    assert_eq!(console.run_unit(&unit), "two");
}

#[test]
fn declaring_into_an_active_package_takes_effect_at_once() {
    let mut console = Console::new();
    run(&mut console, vec![function("pkgLive", &[], vec![ret(text("base"))])]);
    run(
        &mut console,
        vec![package_fn("PkgLive", None, "pkgLive", &[], vec![ret(text("first"))])],
    );
    console.activate_package("PkgLive").unwrap();
    assert_eq!(console.execute(&["pkgLive"]), "first");

    run(
        &mut console,
        vec![package_fn("PkgLive", None, "pkgLive", &[], vec![ret(text("second"))])],
    );
    assert_eq!(console.execute(&["pkgLive"]), "second");
    assert!(console.namespaces().is_package_active(crate::intern::Symbol::intern("PkgLive")));

    console.deactivate_package("PkgLive");
    assert_eq!(console.execute(&["pkgLive"]), "base");
}

#[test]
fn packages_override_methods_too() {
    let mut console = Console::new();
    run(
        &mut console,
        vec![
            method_fn("ScriptObject", "pkgGreet", &["%this"], vec![ret(text("hello"))]),
            package_fn(
                "PkgPolite",
                Some("ScriptObject"),
                "pkgGreet",
                &["%this"],
                vec![ret(concat(parent_call("pkgGreet", vec![var("%this")]), text(", please")))],
            ),
        ],
    );
    let obj = console.create_object("ScriptObject", "PkgGreeter").unwrap();
    assert_eq!(console.execute_on(&obj, &["pkgGreet"]), "hello");
    console.activate_package("PkgPolite").unwrap();
    assert_eq!(console.execute_on(&obj, &["pkgGreet"]), "hello, please");
    console.deactivate_package("PkgPolite");
    assert_eq!(console.execute_on(&obj, &["pkgGreet"]), "hello");
}

#[test]
fn active_package_limit_is_enforced() {
    let mut console = Console::with_config(ConsoleConfig {
        package_limit: 2,
        ..ConsoleConfig::default()
    });
    run(
        &mut console,
        vec![
            package_fn("PkgCapOne", None, "pkgCap", &[], vec![ret(int(1))]),
            package_fn("PkgCapTwo", None, "pkgCap", &[], vec![ret(int(2))]),
            package_fn("PkgCapThree", None, "pkgCap", &[], vec![ret(int(3))]),
        ],
    );
    console.activate_package("PkgCapOne").unwrap();
    console.activate_package("PkgCapTwo").unwrap();
    let err = console.activate_package("PkgCapThree").unwrap_err();
    assert!(err.to_string().contains("PkgCapThree"), "{err}");
    assert_eq!(console.execute(&["pkgCap"]), "2");
}

#[test]
fn configured_limit_is_clamped_and_refusal_leaves_active_list_alone() {
    let config = ConsoleConfig::from_toml_str("package_limit = 9000\n").unwrap();
    let mut console = Console::with_config(config);
    let limit = crate::vm::MAX_ACTIVE_PACKAGES;
    for i in 0..limit {
        console.activate_package(&format!("PkgMany{i}")).unwrap();
    }
    let err = console.activate_package("PkgManyOverflow").unwrap_err();
    assert!(err.to_string().contains(&format!("{limit} packages already active")), "{err}");

    let active = console.namespaces().active_packages();
    assert_eq!(active.len(), limit);
    assert_eq!(active[0].as_str(), "PkgMany0");
    assert_eq!(active[limit - 1].as_str(), format!("PkgMany{}", limit - 1));
    assert!(!console.namespaces().is_package_active(crate::intern::Symbol::intern("PkgManyOverflow")));

    // Re-activating an active package at the limit is still a no-op.
    console.activate_package("PkgMany3").unwrap();
    assert!(console.deactivate_package("PkgMany0"));
    assert!(console.namespaces().active_packages().is_empty());
}
