use ferrous_beans::{
    ApplicationContext, BeanDefinition, BeanError, Beans, LifecycleCallback, Param, Scope, ScopeKind, SimpleScope,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Session {
    id: usize,
    closed: Arc<Mutex<Vec<usize>>>,
}

fn session(created: &Arc<AtomicUsize>, closed: &Arc<Mutex<Vec<usize>>>) -> BeanDefinition {
    let created = created.clone();
    let closed = closed.clone();
    BeanDefinition::of::<Session>()
        .scope(ScopeKind::Custom("request".into()))
        .constructor(vec![], move |_| Ok(Session { id: created.fetch_add(1, Ordering::SeqCst), closed: closed.clone() }))
        .destroy_method(LifecycleCallback::new("close", |session: &Session| {
            session.closed.lock().push(session.id);
            Ok(())
        }))
}

fn request_context(scope: &Arc<SimpleScope>) -> (ApplicationContext, Arc<AtomicUsize>, Arc<Mutex<Vec<usize>>>) {
    let created = Arc::new(AtomicUsize::new(0));
    let closed = Arc::new(Mutex::new(Vec::new()));
    let mut context = ApplicationContext::new();
    context.register_scope("request", scope.clone()).unwrap();
    context.register("session", session(&created, &closed)).unwrap();
    context.refresh().unwrap();
    (context, created, closed)
}

#[test]
fn scoped_beans_are_cached_until_the_scope_ends() {
    let scope = Arc::new(SimpleScope::new("request-1"));
    let (context, created, closed) = request_context(&scope);
    assert_eq!(created.load(Ordering::SeqCst), 0, "scoped beans are never pre-instantiated");

    let first = context.get::<Session>("session").unwrap();
    let second = context.get::<Session>("session").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(scope.len(), 1);

    scope.reset();
    assert_eq!(*closed.lock(), vec![0]);

    let third = context.get::<Session>("session").unwrap();
    assert_eq!(third.id, 1);
    assert!(!context.bean_factory().contains_singleton("session"));
}

#[test]
fn scoped_beans_can_be_destroyed_individually() {
    let scope = Arc::new(SimpleScope::new("request-2"));
    let (context, _, closed) = request_context(&scope);

    context.get_bean("session").unwrap();
    context.destroy_scoped_bean("session").unwrap();
    assert_eq!(*closed.lock(), vec![0]);
    assert!(scope.is_empty());

    // The callback went with the object
    scope.reset();
    assert_eq!(*closed.lock(), vec![0]);
}

#[test]
fn closing_the_context_leaves_scoped_beans_to_their_scope() {
    let scope = Arc::new(SimpleScope::new("request-3"));
    let (context, _, closed) = request_context(&scope);
    context.get_bean("session").unwrap();

    context.close();
    assert!(closed.lock().is_empty());
    scope.reset();
    assert_eq!(*closed.lock(), vec![0]);
}

#[test]
fn singletons_may_not_be_destroyed_as_scoped_beans() {
    let mut context = ApplicationContext::new();
    context.register_singleton("config", 1u8).unwrap();
    context.refresh().unwrap();
    assert!(matches!(context.destroy_scoped_bean("config"), Err(BeanError::IllegalState(_))));
}

#[test]
fn unregistered_scopes_fail_on_first_use() {
    let created = Arc::new(AtomicUsize::new(0));
    let closed = Arc::new(Mutex::new(Vec::new()));
    let mut context = ApplicationContext::new();
    context.register("session", session(&created, &closed)).unwrap();
    context.refresh().unwrap();

    assert!(matches!(context.get_bean("session"), Err(BeanError::NoSuchScope(scope)) if scope == "request"));
}

#[test]
fn built_in_scope_names_are_reserved() {
    let mut context = ApplicationContext::new();
    for name in [ScopeKind::SINGLETON, ScopeKind::PROTOTYPE] {
        let result = context.register_scope(name, Arc::new(SimpleScope::new("custom")));
        assert!(matches!(result, Err(BeanError::IllegalState(_))), "{} must be reserved", name);
    }
}

#[test]
fn singletons_may_depend_on_scoped_beans() {
    struct Handler {
        session: Arc<Session>,
    }

    let scope = Arc::new(SimpleScope::new("request-4"));
    let created = Arc::new(AtomicUsize::new(0));
    let closed = Arc::new(Mutex::new(Vec::new()));
    let mut context = ApplicationContext::new();
    context.register_scope("request", scope.clone()).unwrap();
    context.register("session", session(&created, &closed)).unwrap();
    context
        .register(
            "handler",
            BeanDefinition::of::<Handler>()
                .constructor(vec![Param::reference("session")], |args| Ok(Handler { session: args.bean::<Session>(0)? })),
        )
        .unwrap();
    context.refresh().unwrap();

    let handler = context.get::<Handler>("handler").unwrap();
    let current = context.get::<Session>("session").unwrap();
    assert!(Arc::ptr_eq(&handler.session, &current));
    assert_eq!(scope.conversation_id().as_deref(), Some("request-4"));
}

#[test]
fn scope_names_parse() {
    assert_eq!("prototype".parse::<ScopeKind>().unwrap(), ScopeKind::Prototype);
    assert_eq!("".parse::<ScopeKind>().unwrap(), ScopeKind::Singleton);
    assert_eq!(" session ".parse::<ScopeKind>().unwrap(), ScopeKind::Custom("session".into()));
    assert_eq!(ScopeKind::Custom("session".into()).to_string(), "session");
}
