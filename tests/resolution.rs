use ferrous_beans::{
    ApplicationContext, BeanDefinition, BeanError, Beans, DependencySpec, Param, TypeKey, ValueSpec,
};
use std::sync::Arc;

trait Store: Send + Sync {
    fn name(&self) -> &'static str;
}

struct Disk;
impl Store for Disk {
    fn name(&self) -> &'static str {
        "disk"
    }
}

struct Memory;
impl Store for Memory {
    fn name(&self) -> &'static str {
        "memory"
    }
}

fn disk() -> BeanDefinition {
    BeanDefinition::of::<Disk>().constructor(vec![], |_| Ok(Disk)).exposes::<dyn Store, Disk>(|d| d as Arc<dyn Store>)
}

fn memory() -> BeanDefinition {
    BeanDefinition::of::<Memory>()
        .constructor(vec![], |_| Ok(Memory))
        .exposes::<dyn Store, Memory>(|m| m as Arc<dyn Store>)
}

struct Service {
    store: Arc<dyn Store>,
}

fn service(param: Param) -> BeanDefinition {
    BeanDefinition::of::<Service>()
        .constructor(vec![param], |args| Ok(Service { store: args.bean::<dyn Store>(0)? }))
        .lazy(true)
}

fn context_with(definitions: Vec<(&str, BeanDefinition)>) -> ApplicationContext {
    let mut context = ApplicationContext::new();
    for (name, definition) in definitions {
        context.register(name, definition).unwrap();
    }
    context.refresh().unwrap();
    context
}

#[test]
fn a_unique_candidate_is_injected() {
    let context = context_with(vec![("disk", disk()), ("service", service(Param::autowire::<dyn Store>("store")))]);
    assert_eq!(context.get::<Service>("service").unwrap().store.name(), "disk");
    assert_eq!(context.bean_factory().dependents_of("disk"), vec!["service".to_string()]);
}

#[test]
fn several_candidates_without_tie_breaker_are_ambiguous() {
    let context = context_with(vec![
        ("disk", disk()),
        ("memory", memory()),
        ("service", service(Param::autowire::<dyn Store>("store"))),
    ]);

    match context.get_bean("service") {
        Err(BeanError::AmbiguousDependency { consumer, candidates, .. }) => {
            assert_eq!(consumer, "service");
            assert_eq!(candidates, vec!["disk".to_string(), "memory".to_string()]);
        }
        other => panic!("expected ambiguity, got {:?}", other.map(|bean| bean.name().to_string())),
    }
}

#[test]
fn the_primary_candidate_wins() {
    let context = context_with(vec![
        ("disk", disk()),
        ("memory", memory().primary()),
        ("service", service(Param::autowire::<dyn Store>("store"))),
    ]);
    assert_eq!(context.get::<Service>("service").unwrap().store.name(), "memory");
    assert_eq!(context.get_by_type::<dyn Store>().unwrap().name(), "memory");
}

#[test]
fn several_primaries_are_still_ambiguous() {
    let context = context_with(vec![("disk", disk().primary()), ("memory", memory().primary())]);
    assert!(matches!(context.get_by_type::<dyn Store>(), Err(BeanError::AmbiguousDependency { .. })));
}

#[test]
fn qualifiers_and_parameter_names_select_by_name() {
    let qualified = Param::new(ValueSpec::Autowire(DependencySpec::of::<dyn Store>().qualified("fast")));
    let mut context = ApplicationContext::new();
    context.register("disk", disk()).unwrap();
    context.register("memory", memory()).unwrap();
    context.register_alias("memory", "fast").unwrap();
    context.register("by-qualifier", service(qualified)).unwrap();
    context.register("by-name", service(Param::autowire::<dyn Store>("disk"))).unwrap();
    context.refresh().unwrap();

    assert_eq!(context.get::<Service>("by-qualifier").unwrap().store.name(), "memory");
    assert_eq!(context.get::<Service>("by-name").unwrap().store.name(), "disk");
}

#[test]
fn explicit_references_bypass_type_matching() {
    let context = context_with(vec![
        ("disk", disk()),
        ("memory", memory().primary()),
        ("service", service(Param::reference("disk"))),
        ("broken", service(Param::reference("tape"))),
    ]);
    assert_eq!(context.get::<Service>("service").unwrap().store.name(), "disk");
    assert!(matches!(context.get_bean("broken"), Err(BeanError::NoSuchDefinition(name)) if name == "tape"));
}

#[test]
fn missing_dependencies_fail_unless_optional() {
    struct Reporter {
        store: Option<Arc<dyn Store>>,
    }

    let mut context = ApplicationContext::new();
    context.register("required", service(Param::autowire::<dyn Store>("store"))).unwrap();
    context
        .register(
            "optional",
            BeanDefinition::of::<Reporter>().constructor(vec![Param::optional::<dyn Store>("store")], |args| {
                Ok(Reporter { store: args.optional_bean::<dyn Store>(0)? })
            }),
        )
        .unwrap();
    context.refresh().unwrap();

    assert!(context.get::<Reporter>("optional").unwrap().store.is_none());
    assert!(matches!(
        context.get_bean("required"),
        Err(BeanError::NoSuchDependency { consumer, .. }) if consumer == "required"
    ));
}

#[test]
fn non_candidates_are_skipped_but_still_addressable_by_name() {
    let context = context_with(vec![
        ("disk", disk().autowire_candidate(false)),
        ("memory", memory()),
        ("service", service(Param::autowire::<dyn Store>("store"))),
    ]);
    assert_eq!(context.get::<Service>("service").unwrap().store.name(), "memory");
    assert_eq!(context.get::<dyn Store>("disk").unwrap().name(), "disk");
}

#[test]
fn collections_gather_every_candidate_in_registration_order() {
    struct Registry {
        stores: Vec<Arc<dyn Store>>,
    }

    let context = context_with(vec![
        ("memory", memory()),
        ("disk", disk()),
        (
            "registry",
            BeanDefinition::of::<Registry>()
                .constructor(vec![Param::all::<dyn Store>()], |args| Ok(Registry { stores: args.beans::<dyn Store>(0)? })),
        ),
    ]);

    let names: Vec<_> = context.get::<Registry>("registry").unwrap().stores.iter().map(|s| s.name()).collect();
    assert_eq!(names, vec!["memory", "disk"]);
    assert_eq!(context.get_all::<dyn Store>().unwrap().len(), 2);
}

#[test]
fn a_bean_is_never_its_own_candidate() {
    struct Caching {
        inner: Arc<dyn Store>,
    }
    impl Store for Caching {
        fn name(&self) -> &'static str {
            "caching"
        }
    }

    let context = context_with(vec![
        ("disk", disk()),
        (
            "caching",
            BeanDefinition::of::<Caching>()
                .constructor(vec![Param::autowire::<dyn Store>("inner")], |args| {
                    Ok(Caching { inner: args.bean::<dyn Store>(0)? })
                })
                .exposes::<dyn Store, Caching>(|c| c as Arc<dyn Store>),
        ),
    ]);

    assert_eq!(context.get::<Caching>("caching").unwrap().inner.name(), "disk");
}

#[test]
fn dependencies_can_be_resolved_on_behalf_of_a_consumer() {
    let context = context_with(vec![("disk", disk())]);
    let spec = DependencySpec::of::<dyn Store>();
    let bean = context.resolve_dependency("external", &spec).unwrap().unwrap();
    assert_eq!(bean.name(), "disk");

    let missing = DependencySpec::of::<String>().optional();
    assert!(context.resolve_dependency("external", &missing).unwrap().is_none());
    assert_eq!(context.get_beans_of_type(TypeKey::of::<dyn Store>()).unwrap().len(), 1);
}
