use ferrous_beans::{
    ApplicationContext, Args, BeanDefinition, BeanError, Beans, BoxError, ContextConfig, FactoryMethod, Param, ScopeKind,
    TypeKey,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Counter {
    id: usize,
}

fn counting(created: &Arc<AtomicUsize>) -> impl Fn(&Args) -> Result<Counter, BoxError> + Send + Sync + 'static {
    let created = created.clone();
    move |_: &Args| Ok(Counter { id: created.fetch_add(1, Ordering::SeqCst) })
}

#[test]
fn singletons_are_created_once_and_shared() {
    let created = Arc::new(AtomicUsize::new(0));
    let mut context = ApplicationContext::new();
    context.register("counter", BeanDefinition::of::<Counter>().constructor(vec![], counting(&created))).unwrap();
    context.refresh().unwrap();

    let first = context.get::<Counter>("counter").unwrap();
    let second = context.get::<Counter>("counter").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(created.load(Ordering::SeqCst), 1);
}

#[test]
fn prototypes_are_created_per_request() {
    let created = Arc::new(AtomicUsize::new(0));
    let mut context = ApplicationContext::new();
    context
        .register(
            "counter",
            BeanDefinition::of::<Counter>().scope(ScopeKind::Prototype).constructor(vec![], counting(&created)),
        )
        .unwrap();
    context.refresh().unwrap();
    assert_eq!(created.load(Ordering::SeqCst), 0, "prototypes are never pre-instantiated");

    let first = context.get::<Counter>("counter").unwrap();
    let second = context.get::<Counter>("counter").unwrap();
    assert_ne!(first.id, second.id);
    assert!(context.is_prototype("counter").unwrap());
    assert!(!context.bean_factory().contains_singleton("counter"));
}

#[test]
fn aliases_resolve_to_the_same_bean() {
    let mut context = ApplicationContext::new();
    context.register_singleton("dataSource", 5u32).unwrap();
    context.register_alias("dataSource", "db").unwrap();
    context.register_alias("db", "primaryDb").unwrap();
    context.refresh().unwrap();

    let direct = context.get_bean("dataSource").unwrap();
    let aliased = context.get_bean("primaryDb").unwrap();
    assert!(direct.same_instance(&aliased));
    assert_eq!(aliased.name(), "dataSource");
    assert_eq!(context.aliases("dataSource"), vec!["db".to_string(), "primaryDb".to_string()]);
}

#[test]
fn unknown_names_are_reported() {
    let context = ApplicationContext::new();
    context.refresh().unwrap();
    assert!(matches!(context.get_bean("nope"), Err(BeanError::NoSuchDefinition(name)) if name == "nope"));
    assert!(!context.contains_bean("nope"));
}

#[test]
fn duplicate_names_are_rejected_unless_overriding_is_allowed() {
    let mut strict = ApplicationContext::new();
    strict.register_singleton("value", 1u32).unwrap();
    assert!(matches!(
        strict.register_singleton("value", 2u32),
        Err(BeanError::DuplicateDefinition { name }) if name == "value"
    ));

    let mut lenient = ApplicationContext::with_config(ContextConfig {
        allow_definition_overriding: true,
        ..ContextConfig::default()
    });
    lenient.register_singleton("value", 1u32).unwrap();
    lenient.register_singleton("value", 2u32).unwrap();
    lenient.refresh().unwrap();
    assert_eq!(*lenient.get::<u32>("value").unwrap(), 2);
}

#[test]
fn lazy_singletons_wait_for_the_first_request() {
    let created = Arc::new(AtomicUsize::new(0));
    let mut context = ApplicationContext::new();
    context.register("eager", BeanDefinition::of::<Counter>().constructor(vec![], counting(&created))).unwrap();
    context.register("lazy", BeanDefinition::of::<Counter>().lazy(true).constructor(vec![], counting(&created))).unwrap();
    context.refresh().unwrap();

    assert!(context.bean_factory().contains_singleton("eager"));
    assert!(!context.bean_factory().contains_singleton("lazy"));
    context.get_bean("lazy").unwrap();
    assert_eq!(created.load(Ordering::SeqCst), 2);
}

#[test]
fn factory_methods_build_beans() {
    struct Connection {
        url: String,
    }
    struct ConnectionFactory {
        base: String,
    }

    let mut context = ApplicationContext::new();
    context.register_singleton("factory", ConnectionFactory { base: "postgres://host".into() }).unwrap();
    context
        .register(
            "connection",
            BeanDefinition::of::<Connection>().factory_method(FactoryMethod::on_bean::<ConnectionFactory, _, _>(
                "factory",
                "connect",
                vec![Param::text("orders")],
                |factory, args| Ok(Connection { url: format!("{}/{}", factory.base, args.value::<String>(0)?) }),
            )),
        )
        .unwrap();
    context
        .register(
            "answer",
            BeanDefinition::of::<u64>().factory_method(FactoryMethod::free("answer", vec![], |_| Ok(42u64))),
        )
        .unwrap();
    context.refresh().unwrap();

    assert_eq!(context.get::<Connection>("connection").unwrap().url, "postgres://host/orders");
    assert_eq!(*context.get::<u64>("answer").unwrap(), 42);
    assert_eq!(context.bean_factory().dependencies_of("connection"), vec!["factory".to_string()]);
}

#[test]
fn wrong_view_is_a_type_mismatch() {
    let mut context = ApplicationContext::new();
    context.register_singleton("number", 7u32).unwrap();
    context.refresh().unwrap();

    assert!(matches!(
        context.get::<String>("number"),
        Err(BeanError::TypeMismatch { name, .. }) if name == "number"
    ));
}

#[test]
fn abstract_definitions_cannot_be_requested() {
    let mut context = ApplicationContext::new();
    context.register("template", BeanDefinition::of::<u32>().abstract_()).unwrap();
    context.refresh().unwrap();

    assert!(matches!(context.get_bean("template"), Err(BeanError::InvalidDefinition { .. })));
    assert!(context.get_beans_of_type(TypeKey::of::<u32>()).unwrap().is_empty());
}

#[test]
fn text_values_are_parsed_on_demand() {
    struct Pool {
        size: usize,
    }

    let mut context = ApplicationContext::new();
    context
        .register(
            "pool",
            BeanDefinition::of::<Pool>()
                .constructor(vec![Param::text("16")], |args| Ok(Pool { size: args.parse::<usize>(0)? })),
        )
        .unwrap();
    context.refresh().unwrap();
    assert_eq!(context.get::<Pool>("pool").unwrap().size, 16);
}
