// Contract scenario tests
//
// End-to-end behaviour of contracted callables: the bookstore backend,
// layer ordering, and concurrent invocations.

use super::*;
use futures::FutureExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq)]
struct Book {
    identifier: String,
    author: String,
}

impl Book {
    fn new(identifier: &str, author: &str) -> Self {
        Self { identifier: identifier.to_string(), author: author.to_string() }
    }
}

#[derive(Debug)]
struct Query {
    categories: Vec<String>,
}

impl Query {
    fn new(categories: &[&str]) -> Self {
        Self { categories: categories.iter().map(|c| c.to_string()).collect() }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown category {0:?}")]
struct UnknownCategory(String);

async fn get_categories() -> Vec<&'static str> {
    tokio::task::yield_now().await;
    vec!["sci-fi", "romance"]
}

async fn has_category(category: &str) -> bool {
    get_categories().await.contains(&category)
}

async fn has_author(author: &str) -> bool {
    tokio::task::yield_now().await;
    ["Margaret Cavendish", "Jane Austen"].contains(&author)
}

fn book_contract() -> Contract<Query, Vec<Book>> {
    Contract::new("list_books")
        .require(Condition::try_future("every category is known", |query: &Query| {
            awaited_all(query.categories.iter().map(|category| has_category(category).boxed())).boxed()
        }))
        .ensure(Condition::try_future("every author is known", |post: &Post<Query, Vec<Book>>| {
            awaited_all(post.result.iter().map(|book| has_author(&book.author).boxed())).boxed()
        }))
}

fn list_books(
    lookups: Arc<AtomicUsize>,
) -> AsyncContracted<
    Query,
    Vec<Book>,
    UnknownCategory,
    impl for<'a> Fn(&'a mut Query) -> futures::future::BoxFuture<'a, std::result::Result<Vec<Book>, UnknownCategory>>
    + Send
    + Sync,
> {
    book_contract()
        .wrap_async(move |query: &mut Query| {
            let lookups = Arc::clone(&lookups);
            async move {
                lookups.fetch_add(1, Ordering::SeqCst);
                let mut result = Vec::new();
                for category in &query.categories {
                    match category.as_str() {
                        "sci-fi" => result.push(Book::new("The Blazing World", "Margaret Cavendish")),
                        "romance" => result.push(Book::new("Pride and Prejudice", "Jane Austen")),
                        other => return Err(UnknownCategory(other.to_string())),
                    }
                }
                Ok(result)
            }
            .boxed()
        })
        .unwrap()
}

#[tokio::test]
async fn test_bookstore_known_category() {
    let lookups = Arc::new(AtomicUsize::new(0));
    let list_books = list_books(Arc::clone(&lookups));

    let books = list_books.call(Query::new(&["sci-fi"])).await.unwrap();

    assert_eq!(books.iter().map(|b| b.identifier.as_str()).collect::<Vec<_>>(), vec!["The Blazing World"]);
    assert_eq!(lookups.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_bookstore_unknown_category_never_looks_up() {
    let lookups = Arc::new(AtomicUsize::new(0));
    let list_books = list_books(Arc::clone(&lookups));

    let err = list_books.call(Query::new(&["mystery"])).await.unwrap_err();

    assert_eq!(err.kind(), Some(ContractKind::Precondition));
    let violation = err.violation().unwrap();
    assert_eq!(violation.function, "list_books");
    assert_eq!(violation.condition.description, "every category is known");
    assert_eq!(violation.context.args, "Query { categories: [\"mystery\"] }");
    assert_eq!(lookups.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_bookstore_several_categories() {
    let list_books = list_books(Arc::new(AtomicUsize::new(0)));

    let books = list_books.call(Query::new(&["romance", "sci-fi"])).await.unwrap();

    assert_eq!(
        books,
        vec![
            Book::new("Pride and Prejudice", "Jane Austen"),
            Book::new("The Blazing World", "Margaret Cavendish"),
        ]
    );
}

#[tokio::test]
async fn test_bookstore_unknown_author_is_a_postcondition_violation() {
    let list_books = book_contract()
        .wrap_async(|_: &mut Query| {
            async { Ok::<_, UnknownCategory>(vec![Book::new("Orlando", "Virginia Woolf")]) }.boxed()
        })
        .unwrap();

    let err = list_books.call(Query::new(&["romance"])).await.unwrap_err();

    assert_eq!(err.kind(), Some(ContractKind::Postcondition));
    let violation = err.violation().unwrap();
    assert_eq!(violation.condition.description, "every author is known");
    assert!(violation.context.result.as_deref().unwrap().contains("Virginia Woolf"));
}

type Log = Arc<Mutex<Vec<&'static str>>>;

fn logged<C: 'static>(log: &Log, name: &'static str) -> Condition<C> {
    let log = Arc::clone(log);
    Condition::new(name, move |_: &C| {
        log.lock().unwrap().push(name);
        true
    })
}

fn logged_async<C: 'static>(log: &Log, name: &'static str) -> Condition<C> {
    let log = Arc::clone(log);
    Condition::future(name, move |_: &C| {
        let log = Arc::clone(&log);
        async move {
            tokio::task::yield_now().await;
            log.lock().unwrap().push(name);
            true
        }
        .boxed()
    })
}

#[test]
fn test_layer_order_sync() {
    let log: Log = Arc::default();
    let call_log = Arc::clone(&log);

    let contracted = Contract::<i32, i32>::new("layers")
        .require(logged(&log, "pre outer"))
        .ensure(logged(&log, "post outer"))
        .require(logged(&log, "pre inner"))
        .ensure(logged(&log, "post inner"))
        .wrap(move |x: &mut i32| {
            call_log.lock().unwrap().push("call");
            Ok::<_, UnknownCategory>(*x)
        })
        .unwrap();

    assert_eq!(contracted.call(7).unwrap(), 7);
    assert_eq!(*log.lock().unwrap(), vec!["pre outer", "pre inner", "call", "post inner", "post outer"]);
}

#[tokio::test]
async fn test_layer_order_mixed_sync_and_async() {
    let log: Log = Arc::default();
    let call_log = Arc::clone(&log);

    let contracted = Contract::<i32, i32>::new("layers")
        .require(logged_async(&log, "pre outer"))
        .ensure(logged(&log, "post outer"))
        .require_all([logged(&log, "pre inner a"), logged_async(&log, "pre inner b")])
        .ensure(logged_async(&log, "post inner"))
        .wrap_async(move |x: &mut i32| {
            let call_log = Arc::clone(&call_log);
            async move {
                call_log.lock().unwrap().push("call");
                Ok::<_, UnknownCategory>(*x)
            }
            .boxed()
        })
        .unwrap();

    assert_eq!(contracted.call(7).await.unwrap(), 7);
    assert_eq!(
        *log.lock().unwrap(),
        vec!["pre outer", "pre inner a", "pre inner b", "call", "post inner", "post outer"]
    );
}

#[test]
fn test_declared_records_in_evaluation_order() {
    let log: Log = Arc::default();
    let contract = Contract::<i32, i32>::new("layers")
        .require(logged(&log, "p1"))
        .ensure(logged(&log, "q1"))
        .require_all([logged(&log, "p2"), logged(&log, "p3")])
        .ensure(logged(&log, "q2"));

    let pre: Vec<Vec<&str>> = contract
        .preconditions()
        .map(|record| record.conditions().iter().map(|c| c.description()).collect())
        .collect();
    let post: Vec<Vec<&str>> = contract
        .postconditions()
        .map(|record| record.conditions().iter().map(|c| c.description()).collect())
        .collect();

    assert_eq!(pre, vec![vec!["p1"], vec!["p2", "p3"]]);
    assert_eq!(post, vec![vec!["q2"], vec!["q1"]]);
}

#[test]
fn test_failing_record_stops_later_records() {
    let log: Log = Arc::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let contracted = Contract::<i32, i32>::new("guarded")
        .require(Condition::new("x > 0", |x: &i32| *x > 0))
        .require(logged(&log, "never reached"))
        .wrap(move |x: &mut i32| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, UnknownCategory>(*x)
        })
        .unwrap();

    assert!(contracted.call(0).unwrap_err().is_violation());
    assert!(log.lock().unwrap().is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_callable_runs_exactly_once_when_preconditions_hold() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&seen);

    let contracted = Contract::<(i32, i32), i32>::new("add")
        .require(Condition::new("a >= 0", |(a, _): &(i32, i32)| *a >= 0))
        .require(Condition::new("b >= 0", |(_, b): &(i32, i32)| *b >= 0))
        .ensure(Condition::new("result >= a", |post: &Post<(i32, i32), i32>| post.result >= post.args.0))
        .wrap(move |args: &mut (i32, i32)| {
            recorded.lock().unwrap().push(*args);
            Ok::<_, UnknownCategory>(args.0 + args.1)
        })
        .unwrap();

    for a in 0..5 {
        for b in 0..5 {
            assert_eq!(contracted.call((a, b)).unwrap(), a + b);
        }
    }
    assert_eq!(seen.lock().unwrap().len(), 25);

    assert!(contracted.call((-1, 3)).unwrap_err().is_violation());
    assert!(contracted.call((3, -1)).unwrap_err().is_violation());
    assert_eq!(seen.lock().unwrap().len(), 25);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls_are_independent() {
    let lookups = Arc::new(AtomicUsize::new(0));
    let list_books = Arc::new(list_books(Arc::clone(&lookups)));

    let mut handles = Vec::new();
    for i in 0..32 {
        let list_books = Arc::clone(&list_books);
        let categories: &[&str] = match i % 3 {
            0 => &["sci-fi"],
            1 => &["romance", "sci-fi"],
            _ => &["mystery"],
        };
        let query = Query::new(categories);
        handles.push(tokio::spawn(async move { (i, list_books.call(query).await) }));
    }

    for handle in handles {
        let (i, outcome) = handle.await.unwrap();
        match i % 3 {
            0 => assert_eq!(outcome.unwrap().len(), 1),
            1 => assert_eq!(outcome.unwrap().len(), 2),
            _ => assert_eq!(outcome.unwrap_err().kind(), Some(ContractKind::Precondition)),
        }
    }
    // 11 calls per known-category group reached the lookup
    assert_eq!(lookups.load(Ordering::SeqCst), 22);
}

#[derive(Debug)]
struct Gated {
    gate: Option<Arc<Notify>>,
    value: i32,
}

#[tokio::test]
async fn test_suspended_precondition_does_not_block_other_calls() {
    let order: Log = Arc::default();
    let call_order = Arc::clone(&order);

    let contracted = Contract::<Gated, i32>::new("gated")
        .require(Condition::future("gate opens", |args: &Gated| {
            async move {
                if let Some(gate) = &args.gate {
                    gate.notified().await;
                }
                true
            }
            .boxed()
        }))
        .wrap_async(move |args: &mut Gated| {
            let call_order = Arc::clone(&call_order);
            async move {
                call_order.lock().unwrap().push(if args.gate.is_some() { "gated" } else { "free" });
                Ok::<_, UnknownCategory>(args.value)
            }
            .boxed()
        })
        .unwrap();

    let gate = Arc::new(Notify::new());
    let (gated, free) = tokio::join!(
        contracted.call(Gated { gate: Some(Arc::clone(&gate)), value: 1 }),
        async {
            let free = contracted.call(Gated { gate: None, value: 2 }).await;
            gate.notify_one();
            free
        }
    );

    assert_eq!(gated.unwrap(), 1);
    assert_eq!(free.unwrap(), 2);
    assert_eq!(*order.lock().unwrap(), vec!["free", "gated"]);
}

#[tokio::test]
async fn test_violation_from_async_call_is_serializable() {
    let list_books = list_books(Arc::new(AtomicUsize::new(0)));
    let err = list_books.call(Query::new(&["mystery"])).await.unwrap_err();

    let json = err.violation().unwrap().to_json().unwrap();
    let parsed: Violation = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.kind, ContractKind::Precondition);
    assert!(parsed.condition.file.ends_with("tests.rs"));
    assert_eq!(err.to_string(), parsed.message);
}

#[tokio::test]
async fn test_violations_with_logging_enabled_and_disabled() {
    let _ = tracing_subscriber::fmt().with_test_writer().with_max_level(tracing::Level::TRACE).try_init();

    for log_violations in [true, false] {
        let config = ContractsConfig { log_violations, ..ContractsConfig::default() };
        let list_books = book_contract()
            .with_config(config.clone())
            .wrap_async(|_: &mut Query| async { Ok::<_, UnknownCategory>(Vec::new()) }.boxed())
            .unwrap();

        assert_eq!(list_books.config(), &config);
        let err = list_books.call(Query::new(&["mystery"])).await.unwrap_err();
        assert!(err.is_violation());
    }
}

#[tokio::test]
async fn test_composite_precondition_on_async_callable() {
    let lookups = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&lookups);

    let list_books = Contract::<Query, usize>::new("list_books")
        .require(Condition::all(
            "query is usable",
            vec![
                Condition::new("at least one category", |query: &Query| !query.categories.is_empty()),
                Condition::try_future("every category is known", |query: &Query| {
                    awaited_all(query.categories.iter().map(|category| has_category(category).boxed())).boxed()
                }),
            ],
        ))
        .wrap_async(move |query: &mut Query| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, UnknownCategory>(query.categories.len())
            }
            .boxed()
        })
        .unwrap();

    assert_eq!(list_books.call(Query::new(&["sci-fi", "romance"])).await.unwrap(), 2);
    assert!(list_books.call(Query::new(&[])).await.unwrap_err().is_violation());
    assert!(list_books.call(Query::new(&["mystery"])).await.unwrap_err().is_violation());
    assert_eq!(lookups.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cancelled_call_never_reaches_the_callable() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let stalled = Contract::<i32, i32>::new("stalled")
        .require(Condition::future("never decides", |_: &i32| futures::future::pending::<bool>().boxed()))
        .ensure(Condition::new("result is positive", |post: &Post<i32, i32>| post.result > 0))
        .wrap_async(move |x: &mut i32| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, UnknownCategory>(*x)
            }
            .boxed()
        })
        .unwrap();

    let outcome = tokio::time::timeout(Duration::from_millis(20), stalled.call(1)).await;

    assert!(outcome.is_err(), "the call produced an outcome: {outcome:?}");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}
