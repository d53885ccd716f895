use crossbeam_utils::thread;
use ferrous_beans::{
    ApplicationContext, BeanDefinition, BeanError, Beans, LifecycleCallback, Param, ScopeKind, SimpleScope,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

const THREADS: usize = 16;

struct Slow {
    id: usize,
}

fn slow(created: &Arc<AtomicUsize>) -> BeanDefinition {
    let created = created.clone();
    BeanDefinition::of::<Slow>().lazy(true).constructor(vec![], move |_| {
        std::thread::sleep(Duration::from_millis(20));
        Ok(Slow { id: created.fetch_add(1, Ordering::SeqCst) })
    })
}

#[test]
fn concurrent_requests_create_a_singleton_once() {
    let created = Arc::new(AtomicUsize::new(0));
    let mut context = ApplicationContext::new();
    context.register("slow", slow(&created)).unwrap();
    context.refresh().unwrap();

    let barrier = Barrier::new(THREADS);
    let instances: Vec<Arc<Slow>> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|_| {
                    barrier.wait();
                    context.get::<Slow>("slow").unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    })
    .unwrap();

    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert!(instances.iter().all(|instance| Arc::ptr_eq(instance, &instances[0])));
    assert_eq!(instances[0].id, 0);
}

#[test]
fn concurrent_prototype_requests_get_distinct_instances() {
    let created = Arc::new(AtomicUsize::new(0));
    let mut context = ApplicationContext::new();
    context.register("slow", slow(&created).scope(ScopeKind::Prototype)).unwrap();
    context.refresh().unwrap();

    let ids: Vec<usize> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS).map(|_| s.spawn(|_| context.get::<Slow>("slow").unwrap().id)).collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    })
    .unwrap();

    let mut unique = ids.clone();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(unique.len(), THREADS);
    assert_eq!(created.load(Ordering::SeqCst), THREADS);
}

#[test]
fn concurrent_graphs_share_their_dependencies() {
    struct Leaf;
    struct Branch {
        leaf: Arc<Leaf>,
    }

    let mut context = ApplicationContext::new();
    context.register("leaf", BeanDefinition::of::<Leaf>().lazy(true).constructor(vec![], |_| Ok(Leaf))).unwrap();
    for index in 0..THREADS {
        context
            .register(
                format!("branch-{}", index),
                BeanDefinition::of::<Branch>()
                    .lazy(true)
                    .constructor(vec![Param::autowire::<Leaf>("leaf")], |args| Ok(Branch { leaf: args.bean::<Leaf>(0)? })),
            )
            .unwrap();
    }
    context.refresh().unwrap();

    let leaves: Vec<Arc<Leaf>> = thread::scope(|s| {
        let context = &context;
        let handles: Vec<_> = (0..THREADS)
            .map(|index| s.spawn(move |_| context.get::<Branch>(&format!("branch-{}", index)).unwrap().leaf.clone()))
            .collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    })
    .unwrap();

    assert!(leaves.iter().all(|leaf| Arc::ptr_eq(leaf, &leaves[0])));
    assert_eq!(context.bean_factory().dependents_of("leaf").len(), THREADS);
}

#[test]
fn a_failed_creation_can_be_retried_from_another_thread() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    let mut context = ApplicationContext::new();
    context
        .register(
            "flaky",
            BeanDefinition::of::<usize>().lazy(true).constructor(vec![], move |_| {
                match counter.fetch_add(1, Ordering::SeqCst) {
                    0 => Err("warming up".into()),
                    attempt => Ok(attempt),
                }
            }),
        )
        .unwrap();
    context.refresh().unwrap();

    assert!(matches!(context.get_bean("flaky"), Err(BeanError::CreationFailed { .. })));
    let value = thread::scope(|s| s.spawn(|_| *context.get::<usize>("flaky").unwrap()).join().unwrap()).unwrap();
    assert_eq!(value, 1);
    assert_eq!(*context.get::<usize>("flaky").unwrap(), 1);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[test]
fn racing_scoped_creations_register_one_destruction() {
    let scope = Arc::new(SimpleScope::new("request"));
    let created = Arc::new(AtomicUsize::new(0));
    let destroyed = Arc::new(AtomicUsize::new(0));
    let both_creating = Arc::new(Barrier::new(2));

    let mut context = ApplicationContext::new();
    context.register_scope("request", scope.clone()).unwrap();
    let (counter, gate, sink) = (created.clone(), both_creating.clone(), destroyed.clone());
    context
        .register(
            "session",
            BeanDefinition::of::<Slow>()
                .scope(ScopeKind::Custom("request".into()))
                .constructor(vec![], move |_| {
                    gate.wait();
                    Ok(Slow { id: counter.fetch_add(1, Ordering::SeqCst) })
                })
                .destroy_method(LifecycleCallback::new("close", move |_: &Slow| {
                    sink.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })),
        )
        .unwrap();
    context.refresh().unwrap();

    let ids: Vec<usize> = thread::scope(|s| {
        let handles: Vec<_> = (0..2).map(|_| s.spawn(|_| context.get::<Slow>("session").unwrap().id)).collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    })
    .unwrap();

    assert_eq!(created.load(Ordering::SeqCst), 2);
    assert_eq!(ids[0], ids[1]);
    assert_eq!(scope.len(), 1);

    scope.reset();
    assert_eq!(destroyed.load(Ordering::SeqCst), 1);
}
