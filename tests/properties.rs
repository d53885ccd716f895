/// Property-based tests for container ordering guarantees
///
/// Creation and destruction order must follow registration order and the
/// dependency graph, whatever mix of beans is registered.

use ferrous_beans::{
    ApplicationContext, BeanDefinition, ConfigProvider, ConfigValue, LifecycleCallback, MapConfigSource, Param,
    PlaceholderConfigurer,
};
use parking_lot::Mutex;
use proptest::prelude::*;
use std::sync::Arc;

type Log = Arc<Mutex<Vec<String>>>;

fn tracked(name: String, log: &Log, params: Vec<Param>) -> BeanDefinition {
    let log = log.clone();
    BeanDefinition::of::<String>()
        .constructor(params, move |_| Ok(name.clone()))
        .destroy_method(LifecycleCallback::new("close", move |name: &String| {
            log.lock().push(name.clone());
            Ok(())
        }))
}

// Property: eager singletons are created in registration order and destroyed in reverse
proptest! {
    #[test]
    fn eager_singletons_follow_registration_order(lazy_flags in prop::collection::vec(any::<bool>(), 1..12)) {
        let log: Log = Arc::default();
        let mut context = ApplicationContext::new();
        for (index, lazy) in lazy_flags.iter().enumerate() {
            let name = format!("bean-{}", index);
            context.register(name.clone(), tracked(name, &log, vec![]).lazy(*lazy)).unwrap();
        }
        context.refresh().unwrap();

        let eager: Vec<String> = lazy_flags
            .iter()
            .enumerate()
            .filter(|(_, lazy)| !**lazy)
            .map(|(index, _)| format!("bean-{}", index))
            .collect();
        prop_assert_eq!(context.bean_factory().singleton_creation_order(), eager.clone());

        context.close();
        let mut reversed = eager;
        reversed.reverse();
        prop_assert_eq!(log.lock().clone(), reversed);
    }
}

// Property: in a dependency chain, dependents are always destroyed before their dependencies
proptest! {
    #[test]
    fn chains_are_destroyed_dependents_first(
        registration in (1usize..10).prop_flat_map(|len| Just((0..len).collect::<Vec<_>>()).prop_shuffle())
    ) {
        let log: Log = Arc::default();
        let mut context = ApplicationContext::new();
        for &index in &registration {
            let params = if index == 0 { vec![] } else { vec![Param::reference(format!("link-{}", index - 1))] };
            let name = format!("link-{}", index);
            context.register(name.clone(), tracked(name, &log, params)).unwrap();
        }
        context.refresh().unwrap();
        prop_assert_eq!(context.bean_factory().singleton_count(), registration.len());

        context.close();
        let expected: Vec<String> = (0..registration.len()).rev().map(|index| format!("link-{}", index)).collect();
        prop_assert_eq!(log.lock().clone(), expected);
    }
}

// Property: every alias in a chain resolves to the same bean
proptest! {
    #[test]
    fn alias_chains_resolve_to_the_canonical_bean(depth in 1usize..8) {
        let mut context = ApplicationContext::new();
        context.register_singleton("target", 99u32).unwrap();
        let mut previous = "target".to_string();
        for level in 0..depth {
            let alias = format!("alias-{}", level);
            context.register_alias(&previous, alias.clone()).unwrap();
            previous = alias;
        }
        context.refresh().unwrap();

        let bean = context.get_bean(&previous).unwrap();
        prop_assert_eq!(bean.name(), "target");
        prop_assert_eq!(context.aliases("target").len(), depth);
    }
}

// Property: placeholders resolve to the configured value or fall back to their default
proptest! {
    #[test]
    fn placeholders_resolve_or_default(
        value in "[a-z0-9 ./]{0,24}",
        default in "[a-z0-9 ./]{0,24}",
        configured in any::<bool>(),
    ) {
        let mut source = MapConfigSource::new();
        if configured {
            source.insert("service.endpoint", ConfigValue::String(value.clone()));
        }
        let configurer = PlaceholderConfigurer::new(Arc::new(ConfigProvider::new().with_source(source)));

        let resolved = configurer.resolve(&format!("<${{service.endpoint:{}}}>", default)).unwrap();
        let expected = if configured { &value } else { &default };
        prop_assert_eq!(resolved, format!("<{}>", expected));
    }
}
