use parking_lot::Mutex;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tangle::{
    class, factory, value, Access, Bundle, Construct, Context, InitializeErrorKind, InstantiateErrorKind,
    InstantiatorResult, Initializer, Module, Options, Registration, ResolveErrorKind,
};

type Journal = Arc<Mutex<Vec<&'static str>>>;

struct Settings {
    dsn: &'static str,
}

struct Pool {
    dsn: &'static str,
    open: AtomicBool,
    journal: Journal,
}

impl Initializer for Pool {
    async fn initialize(&self) -> Result<(), anyhow::Error> {
        tokio::task::yield_now().await;
        self.open.store(true, Ordering::SeqCst);
        self.journal.lock().push("pool::initialize");
        Ok(())
    }

    async fn terminate(&self) -> Result<(), anyhow::Error> {
        self.open.store(false, Ordering::SeqCst);
        self.journal.lock().push("pool::terminate");
        Ok(())
    }
}

struct UserRepository {
    pool: Arc<Pool>,
    journal: Journal,
}

impl UserRepository {
    fn find(&self, id: u32) -> Result<String, anyhow::Error> {
        if !self.pool.open.load(Ordering::SeqCst) {
            anyhow::bail!("pool {} is closed", self.pool.dsn);
        }
        Ok(format!("user#{id}@{}", self.pool.dsn))
    }
}

impl Initializer for UserRepository {
    async fn initialize(&self) -> Result<(), anyhow::Error> {
        if !self.pool.open.load(Ordering::SeqCst) {
            anyhow::bail!("pool isn't initialized");
        }
        self.journal.lock().push("user_repository::initialize");
        Ok(())
    }
}

struct RequestId(u64);

#[derive(Debug)]
struct RequestLogger {
    request_id: u64,
}

impl Construct for RequestLogger {
    fn construct(bundle: Bundle) -> Result<Self, InstantiateErrorKind> {
        let request_id = bundle
            .context()
            .and_then(Context::get::<RequestId>)
            .ok_or_else(|| anyhow::anyhow!("request id is missing"))?;
        Ok(Self {
            request_id: request_id.0,
        })
    }
}

fn database_module(journal: &Journal) -> Module {
    let module = Module::new("database");
    module
        .push(Registration::create(
            factory(|bundle: Bundle| -> InstantiatorResult<Pool> {
                let settings = bundle.get::<Settings>("settings")?;
                let journal = bundle.get::<Journal>("journal")?;
                Ok(Pool {
                    dsn: settings.dsn,
                    open: AtomicBool::new(false),
                    journal: (*journal).clone(),
                })
            }),
            Options::new().token("pool").access(Access::Private),
        ))
        .unwrap()
        .push(Registration::create(
            value(Settings { dsn: "postgres://db" }),
            Options::new().token("settings").access(Access::Internal),
        ))
        .unwrap()
        .push(Registration::create(
            value(journal.clone()),
            Options::new().token("journal").access(Access::Private),
        ))
        .unwrap()
        .push(Registration::create(
            factory(|bundle: Bundle| -> InstantiatorResult<UserRepository> {
                Ok(UserRepository {
                    pool: bundle.get("pool")?,
                    journal: (*bundle.get::<Journal>("journal")?).clone(),
                })
            }),
            Options::new().token("user_repository"),
        ))
        .unwrap()
        .add_initializer::<Pool>("pool")
        .add_initializer::<UserRepository>("user_repository");
    module
}

#[tokio::test]
async fn test_application_lifecycle() {
    let journal = Journal::default();
    let database = database_module(&journal);

    let app = Module::new("app");
    app.use_module(&database)
        .unwrap()
        .push(Registration::create(
            class::<RequestLogger>(),
            Options::new().token("request_logger").scoped(),
        ))
        .unwrap();

    assert!(app.has("user_repository"));
    assert!(app.has("settings"));
    assert!(!app.has("pool"));
    assert!(!app.has("journal"));
    assert_eq!(app.container().access("settings"), Some(Access::Private));

    app.initialize().await.unwrap();
    assert!(app.is_initialized());

    let users = app.provide::<UserRepository>("user_repository").unwrap();
    assert_eq!(users.find(1).unwrap(), "user#1@postgres://db");

    let mut values = tangle::ContextValues::new();
    values.insert(RequestId(7));
    let request = Context::with_values(values);
    let logger = app.container().provide_in::<RequestLogger>("request_logger", &request).unwrap();
    assert_eq!(logger.request_id, 7);
    assert!(Arc::ptr_eq(
        &logger,
        &app.container().provide_in::<RequestLogger>("request_logger", &request).unwrap()
    ));

    app.terminate().await.unwrap();
    assert!(users.find(1).is_err());

    assert_eq!(
        *journal.lock(),
        vec!["pool::initialize", "user_repository::initialize", "pool::terminate"]
    );
}

#[tokio::test]
async fn test_initializers_run_in_order() {
    let journal = Journal::default();
    let module = Module::new("database");
    module
        .push(Registration::create(
            value(Settings { dsn: "mysql://db" }),
            Options::new().token("settings"),
        ))
        .unwrap()
        .push(Registration::create(value(journal.clone()), Options::new().token("journal")))
        .unwrap()
        .push(Registration::create(
            factory(|bundle: Bundle| -> InstantiatorResult<Pool> {
                Ok(Pool {
                    dsn: bundle.get::<Settings>("settings")?.dsn,
                    open: AtomicBool::new(false),
                    journal: (*bundle.get::<Journal>("journal")?).clone(),
                })
            }),
            Options::new().token("pool"),
        ))
        .unwrap()
        .push(Registration::create(
            factory(|bundle: Bundle| -> InstantiatorResult<UserRepository> {
                Ok(UserRepository {
                    pool: bundle.get("pool")?,
                    journal: (*bundle.get::<Journal>("journal")?).clone(),
                })
            }),
            Options::new().token("user_repository"),
        ))
        .unwrap();

    // Repository first: it requires an open pool
    module
        .add_initializer::<UserRepository>("user_repository")
        .add_initializer::<Pool>("pool");

    let err = module.initialize().await.unwrap_err();

    assert!(matches!(&err, InitializeErrorKind::Failed { token, .. } if token == "user_repository"));
    assert!(journal.lock().is_empty());
    assert!(!module.provide::<Pool>("pool").unwrap().open.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_initializer_of_unknown_token() {
    let module = Module::new("app");
    module.add_initializer::<Pool>("pool");

    assert!(matches!(
        module.initialize().await,
        Err(InitializeErrorKind::Resolve(ResolveErrorKind::UnknownToken { .. }))
    ));
}

#[test]
fn test_missing_request_context() {
    let app = Module::new("app");
    app.push(Registration::create(
        class::<RequestLogger>(),
        Options::new().token("request_logger").scoped(),
    ))
    .unwrap();

    assert!(matches!(
        app.provide::<RequestLogger>("request_logger"),
        Err(ResolveErrorKind::MissingContext { .. })
    ));

    let err = app
        .container()
        .provide_in::<RequestLogger>("request_logger", &Context::new())
        .unwrap_err();
    assert!(matches!(
        err,
        ResolveErrorKind::Instantiate {
            source: InstantiateErrorKind::Custom(_),
            ..
        }
    ));
}
