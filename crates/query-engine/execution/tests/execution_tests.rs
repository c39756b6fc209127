//! Run statements against the fixture database.

use std::time::Duration;

use chrono::NaiveDate;
use query_engine_execution::driver::Driver;
use query_engine_execution::eager::{EagerLoadSettings, EagerLoader, Entity, LoadState};
use query_engine_execution::error::Error;
use query_engine_execution::metrics::Metrics;
use query_engine_execution::query;
use query_engine_metadata::metadata::{DialectName, LoadStrategy, ScalarType};
use query_engine_models::{
    binding, col, func, insert_into, lit, subquery, table, values, Contain, Field, Statement,
    Value,
};
use query_engine_translation::translation::eager;
use query_engine_translation::translation::error::Error as TranslationError;
use query_engine_translation::translation::helpers::Env;
use similar_asserts::assert_eq;
use tests_common::counting_driver::CountingDriver;
use tests_common::deployment::load_configuration;
use tests_common::fixtures::{create_fixture_driver, fresh_metrics};

async fn execute(
    driver: &dyn Driver,
    metrics: &Metrics,
    dialect: DialectName,
    statement: &Statement,
) -> Result<Vec<Entity>, Error> {
    let configuration = load_configuration(Some(dialect)).await.unwrap();
    let env = Env::new(&configuration.metadata, &configuration.dialect);
    query::execute(driver, metrics, &env, &configuration.eager_load, statement).await
}

async fn count(driver: &dyn Driver, statement: &Statement) -> i64 {
    let configuration = load_configuration(None).await.unwrap();
    let env = Env::new(&configuration.metadata, &configuration.dialect);
    let metrics = fresh_metrics().unwrap();
    query::count(driver, &metrics, &env, statement).await.unwrap()
}

fn text(entity: &Entity, field: &str) -> String {
    match entity.get(field) {
        Some(Value::String(value)) => value.clone(),
        other => panic!("expected text in '{field}', got {other:?}"),
    }
}

/// The value of `field` in every entity related through `association`.
fn related_texts(entity: &Entity, association: &str, field: &str) -> Vec<String> {
    entity
        .related(association)
        .map(|related| {
            related
                .entities()
                .into_iter()
                .map(|child| text(child, field))
                .collect()
        })
        .unwrap_or_default()
}

/// The integer ids of every entity related through `association`.
fn related_ids(entity: &Entity, association: &str) -> Vec<i64> {
    entity
        .related(association)
        .map(|related| {
            related
                .entities()
                .into_iter()
                .filter_map(|child| match child.get("id") {
                    Some(Value::Int(id)) => Some(*id),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

fn authors_with_articles_and_tags() -> Statement {
    table("authors")
        .order_asc(col("id"))
        .contain(
            "articles",
            Contain::new().contain("tags", Contain::new().order_asc(col("name"))),
        )
        .into()
}

mod eager_loading {
    use super::*;
    use similar_asserts::assert_eq;

    #[tokio::test]
    async fn one_round_trip_per_association() {
        let driver = CountingDriver::new(create_fixture_driver().await.unwrap());
        let metrics = fresh_metrics().unwrap();

        let authors = execute(
            &driver,
            &metrics,
            DialectName::Sqlite,
            &authors_with_articles_and_tags(),
        )
        .await
        .unwrap();

        assert_eq!(driver.statement_count(), 3);
        assert_eq!(metrics.eager_round_trips_total.get(), 2);

        let names: Vec<String> = authors.iter().map(|author| text(author, "name")).collect();
        assert_eq!(names, vec!["mariano", "nate", "larry", "garrett"]);

        let mariano = &authors[0];
        assert_eq!(
            related_texts(mariano, "articles", "title"),
            vec!["First Article", "Third Article"]
        );
        let first = mariano.related("articles").unwrap().entities()[0];
        assert_eq!(related_texts(first, "tags", "name"), vec!["tag1", "tag2"]);
        let third = mariano.related("articles").unwrap().entities()[1];
        assert!(related_texts(third, "tags", "name").is_empty());

        assert!(related_texts(&authors[1], "articles", "title").is_empty());
        let larry = &authors[2];
        let second = larry.related("articles").unwrap().entities()[0];
        assert_eq!(related_texts(second, "tags", "name"), vec!["tag1", "tag3"]);
    }

    #[tokio::test]
    async fn junction_keys_are_not_returned() {
        let driver = create_fixture_driver().await.unwrap();
        let metrics = fresh_metrics().unwrap();
        let statement = table("articles")
            .filter(col("id").equals(lit(1)))
            .contain("tags", Contain::new().select(["name"]))
            .into();

        let articles = execute(&driver, &metrics, DialectName::Sqlite, &statement)
            .await
            .unwrap();
        let tags = articles[0].related("tags").unwrap().entities();
        assert_eq!(tags.len(), 2);
        for tag in tags {
            assert_eq!(tag.fields.keys().cloned().collect::<Vec<String>>(), vec!["name"]);
        }
    }

    #[tokio::test]
    async fn deep_belongs_to_many_with_subquery_strategy() {
        let driver = CountingDriver::new(create_fixture_driver().await.unwrap());
        let metrics = fresh_metrics().unwrap();
        let statement = table("authors")
            .filter(col("id").equals(lit(3)))
            .contain(
                "articles",
                Contain::new()
                    .strategy(LoadStrategy::Subquery)
                    .contain("tags", Contain::new().order_asc(col("name"))),
            )
            .into();

        let authors = execute(&driver, &metrics, DialectName::Sqlite, &statement)
            .await
            .unwrap();

        assert_eq!(driver.statement_count(), 3);
        assert!(driver.statements()[1].contains("\"parent_source\""));
        let [larry] = authors.as_slice() else {
            panic!("expected one author, got {authors:?}");
        };
        let articles = larry.related("articles").unwrap().entities();
        assert_eq!(text(articles[0], "title"), "Second Article");
        assert_eq!(related_texts(articles[0], "tags", "name"), vec!["tag1", "tag3"]);
    }

    #[tokio::test]
    async fn belongs_to_then_belongs_to_many() {
        let driver = create_fixture_driver().await.unwrap();
        let metrics = fresh_metrics().unwrap();
        let statement = table("articles")
            .select(["title"])
            .filter(col("author_id").gt(lit(1)))
            .contain(
                "author",
                Contain::new().contain("tags", Contain::new().order_asc(col("name"))),
            )
            .into();

        let articles = execute(&driver, &metrics, DialectName::Sqlite, &statement)
            .await
            .unwrap();

        let [second] = articles.as_slice() else {
            panic!("expected one article, got {articles:?}");
        };
        assert_eq!(text(second, "title"), "Second Article");
        assert!(second.get("author_id").is_none());
        let author = second.related("author").unwrap().entities()[0];
        assert_eq!(author.get("id"), Some(&Value::Int(3)));
        assert_eq!(related_texts(author, "tags", "name"), vec!["tag1", "tag2"]);
    }

    #[tokio::test]
    async fn failed_fetch_marks_the_association() {
        let driver = CountingDriver::new(create_fixture_driver().await.unwrap())
            .fail_matching("\"tags\"");
        let metrics = fresh_metrics().unwrap();
        let configuration = load_configuration(None).await.unwrap();
        let env = Env::new(&configuration.metadata, &configuration.dialect);
        let plan = eager::plan(&env, &authors_with_articles_and_tags()).unwrap();

        let mut loader = EagerLoader::new(&driver, env, &configuration.eager_load, &metrics);
        let error = loader.load(&plan).await.unwrap_err();

        assert!(
            matches!(&error, Error::Fetch { path, depth: 2, .. } if path == "articles.tags"),
            "{error}"
        );
        assert_eq!(loader.state("articles"), Some(LoadState::ChildrenFetched));
        assert_eq!(loader.state("articles.tags"), Some(LoadState::Failed));
        assert_eq!(metrics.eager_failures_total.get(), 1);
    }

    #[tokio::test]
    async fn slow_fetch_times_out() {
        let driver = CountingDriver::new(create_fixture_driver().await.unwrap())
            .delay_matching("\"tags\"", Duration::from_millis(500));
        let metrics = fresh_metrics().unwrap();
        let configuration = load_configuration(None).await.unwrap();
        let env = Env::new(&configuration.metadata, &configuration.dialect);
        let settings = EagerLoadSettings {
            concurrency_limit: 1,
            fetch_timeout: Duration::from_millis(50),
        };
        let plan = eager::plan(&env, &authors_with_articles_and_tags()).unwrap();

        let mut loader = EagerLoader::new(&driver, env, &settings, &metrics);
        let error = loader.load(&plan).await.unwrap_err();

        assert!(
            matches!(&error, Error::Timeout { path, depth: 2, timeout_ms: 50 } if path == "articles.tags"),
            "{error}"
        );
        assert_eq!(loader.state("articles.tags"), Some(LoadState::Failed));
        assert_eq!(metrics.eager_failures_total.get(), 1);
    }

    #[tokio::test]
    async fn completed_loads_are_merged() {
        let driver = create_fixture_driver().await.unwrap();
        let metrics = fresh_metrics().unwrap();
        let configuration = load_configuration(None).await.unwrap();
        let env = Env::new(&configuration.metadata, &configuration.dialect);
        let plan = eager::plan(&env, &authors_with_articles_and_tags()).unwrap();

        let mut loader = EagerLoader::new(&driver, env, &configuration.eager_load, &metrics);
        loader.load(&plan).await.unwrap();

        assert_eq!(loader.state("articles"), Some(LoadState::Merged));
        assert_eq!(loader.state("articles.tags"), Some(LoadState::Merged));
        assert_eq!(loader.state("comments"), None);
    }

    #[tokio::test]
    async fn repeated_junction_rows_link_a_tag_once() {
        for strategy in [LoadStrategy::Select, LoadStrategy::Subquery] {
            let driver = CountingDriver::new(create_fixture_driver().await.unwrap());
            let metrics = fresh_metrics().unwrap();
            let statement = table("articles")
                .order_asc(col("id"))
                .contain(
                    "labels",
                    Contain::new().strategy(strategy).order_asc(col("name")),
                )
                .into();

            let articles = execute(&driver, &metrics, DialectName::Sqlite, &statement)
                .await
                .unwrap();

            let labels: Vec<Vec<String>> = articles
                .iter()
                .map(|article| related_texts(article, "labels", "name"))
                .collect();
            assert_eq!(
                labels,
                vec![vec!["tag1", "tag2"], vec!["tag1", "tag3"], vec![]],
                "{strategy:?}"
            );
            assert_eq!(
                driver.statements()[1].contains("\"parent_source\""),
                strategy == LoadStrategy::Subquery
            );
        }
    }

    #[tokio::test]
    async fn siblings_are_fetched_concurrently() {
        let driver = CountingDriver::new(create_fixture_driver().await.unwrap())
            .delay_matching("\"authors\"", Duration::from_millis(100));
        let metrics = fresh_metrics().unwrap();
        let configuration = load_configuration(None).await.unwrap();
        let env = Env::new(&configuration.metadata, &configuration.dialect);
        let settings = EagerLoadSettings {
            concurrency_limit: 3,
            fetch_timeout: Duration::from_secs(5),
        };
        let statement = table("articles")
            .order_asc(col("id"))
            .contain("author", Contain::new())
            .contain("comments", Contain::new().order_asc(col("id")))
            .contain("tags", Contain::new().order_asc(col("name")))
            .into();
        let plan = eager::plan(&env, &statement).unwrap();

        let mut loader = EagerLoader::new(&driver, env, &settings, &metrics);
        let articles = loader.load(&plan).await.unwrap();

        assert_eq!(driver.statement_count(), 4);
        assert_eq!(metrics.eager_round_trips_total.get(), 3);
        for path in ["author", "comments", "tags"] {
            assert_eq!(loader.state(path), Some(LoadState::Merged), "{path}");
        }

        let authors: Vec<String> = articles
            .iter()
            .map(|article| related_texts(article, "author", "name").concat())
            .collect();
        assert_eq!(authors, vec!["mariano", "larry", "mariano"]);

        let comments: Vec<Vec<i64>> = articles
            .iter()
            .map(|article| related_ids(article, "comments"))
            .collect();
        assert_eq!(comments, vec![vec![1, 2, 3, 4], vec![5, 6], vec![]]);

        let tags: Vec<Vec<String>> = articles
            .iter()
            .map(|article| related_texts(article, "tags", "name"))
            .collect();
        assert_eq!(tags, vec![vec!["tag1", "tag2"], vec!["tag1", "tag3"], vec![]]);
    }

    #[tokio::test]
    async fn unencodable_keys_mark_the_association() {
        let driver = CountingDriver::new(create_fixture_driver().await.unwrap());
        let metrics = fresh_metrics().unwrap();
        let mut configuration = load_configuration(None).await.unwrap();
        if let Some(comments) = configuration.metadata.tables.0.get_mut("comments") {
            if let Some(article_id) = comments.columns.get_mut("article_id") {
                article_id.r#type = ScalarType::Date;
            }
        }
        let env = Env::new(&configuration.metadata, &configuration.dialect);
        let statement = table("articles").contain("comments", Contain::new()).into();
        let plan = eager::plan(&env, &statement).unwrap();

        let mut loader = EagerLoader::new(&driver, env, &configuration.eager_load, &metrics);
        let error = loader.load(&plan).await.unwrap_err();

        assert!(
            matches!(
                error,
                Error::Translation(TranslationError::TypeConversion(_))
            ),
            "{error}"
        );
        assert_eq!(loader.state("comments"), Some(LoadState::Failed));
        assert_eq!(driver.statement_count(), 1);
        assert_eq!(metrics.eager_failures_total.get(), 1);
    }
}

mod statements {
    use super::*;
    use similar_asserts::assert_eq;

    #[tokio::test]
    async fn count_with_bind() {
        let driver = create_fixture_driver().await.unwrap();
        let statement = table("articles")
            .filter(col("title").like(binding(":title")))
            .bind(":title", "%Second%", None)
            .into();
        assert_eq!(count(&driver, &statement).await, 1);
    }

    #[tokio::test]
    async fn subquery_with_bind() {
        let driver = create_fixture_driver().await.unwrap();
        let metrics = fresh_metrics().unwrap();
        let statement = table("articles")
            .select(["title"])
            .filter(col("id").not_in_query(
                table("articles")
                    .select(["id"])
                    .filter(col("title").like(binding(":title"))),
            ))
            .bind(":title", "Second%", None)
            .order_asc(col("id"))
            .into();

        let articles = execute(&driver, &metrics, DialectName::Sqlite, &statement)
            .await
            .unwrap();
        let titles: Vec<String> = articles.iter().map(|article| text(article, "title")).collect();
        assert_eq!(titles, vec!["First Article", "Third Article"]);
    }

    #[tokio::test]
    async fn aliased_aggregate() {
        let driver = create_fixture_driver().await.unwrap();
        let metrics = fresh_metrics().unwrap();
        let statement = table("comments")
            .field("sumUsers", Field::expression(func("sum", vec![col("user_id")])))
            .into();

        let rows = execute(&driver, &metrics, DialectName::Sqlite, &statement)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("sumUsers"), Some(&Value::Int(11)));
    }

    #[tokio::test]
    async fn typed_function_result() {
        let driver = create_fixture_driver().await.unwrap();
        let metrics = fresh_metrics().unwrap();
        let statement = table("comments")
            .field("max", Field::expression(func("max", vec![col("created")])))
            .into();

        let rows = execute(&driver, &metrics, DialectName::Sqlite, &statement)
            .await
            .unwrap();
        let expected = NaiveDate::from_ymd_opt(2007, 3, 18)
            .and_then(|date| date.and_hms_opt(10, 55, 23))
            .unwrap();
        assert_eq!(rows[0].get("max"), Some(&Value::DateTime(expected)));
    }

    #[tokio::test]
    async fn count_union_and_union_all() {
        let driver = create_fixture_driver().await.unwrap();
        let first_comment = || table("comments").select(["id"]).filter(col("id").equals(lit(1)));

        let union = first_comment().union(first_comment()).into();
        assert_eq!(count(&driver, &union).await, 1);

        let union_all = first_comment().union_all(first_comment()).into();
        assert_eq!(count(&driver, &union_all).await, 2);

        let second_comment = || table("comments").select(["id"]).filter(col("id").equals(lit(2)));
        let union = first_comment().union(second_comment()).into();
        assert_eq!(count(&driver, &union).await, 2);
        let union_all = first_comment().union_all(second_comment()).into();
        assert_eq!(count(&driver, &union_all).await, 2);
    }

    #[tokio::test]
    async fn ordered_union() {
        let driver = create_fixture_driver().await.unwrap();
        let metrics = fresh_metrics().unwrap();
        let published = || col("published").equals(lit("Y"));
        let statement = table("comments")
            .select(["id", "comment"])
            .filter(query_engine_models::and(vec![published(), col("id").lte(lit(3))]))
            .union(
                table("comments")
                    .select(["id", "comment"])
                    .filter(query_engine_models::and(vec![published(), col("id").gt(lit(3))])),
            )
            .order_desc(col("id"))
            .into();

        let rows = execute(&driver, &metrics, DialectName::Sqlite, &statement)
            .await
            .unwrap();
        let ids: Vec<&Value> = rows.iter().filter_map(|row| row.get("id")).collect();
        assert_eq!(
            ids,
            vec![
                &Value::Int(6),
                &Value::Int(5),
                &Value::Int(3),
                &Value::Int(2),
                &Value::Int(1)
            ]
        );
    }

    #[tokio::test]
    async fn insert_with_a_subquery_value() {
        let driver = CountingDriver::new(create_fixture_driver().await.unwrap());
        let metrics = fresh_metrics().unwrap();
        let configuration = load_configuration(None).await.unwrap();
        let env = Env::new(&configuration.metadata, &configuration.dialect);
        let insert = insert_into("articles")
            .value("id", lit(4))
            .value("author_id", lit(1))
            .value(
                "title",
                subquery(values().field("title", Field::expression(lit("jose")))),
            );

        let written = query::insert(&driver, &metrics, &env, &insert).await.unwrap();
        assert_eq!(written, 1);
        assert!(driver.statements()[0].starts_with("INSERT INTO \"articles\""));

        let statement = table("articles")
            .select(["title", "published"])
            .filter(col("id").equals(lit(4)))
            .into();
        let articles = execute(&driver, &metrics, DialectName::Sqlite, &statement)
            .await
            .unwrap();
        let [article] = articles.as_slice() else {
            panic!("expected one article, got {articles:?}");
        };
        assert_eq!(text(article, "title"), "jose");
        assert_eq!(text(article, "published"), "N");
        assert_eq!(metrics.statements_total.get(), 2);
    }

    #[tokio::test]
    async fn failed_insert_names_the_collection() {
        let driver = create_fixture_driver().await.unwrap();
        let metrics = fresh_metrics().unwrap();
        let configuration = load_configuration(None).await.unwrap();
        let env = Env::new(&configuration.metadata, &configuration.dialect);
        let duplicate = insert_into("articles")
            .value("id", lit(1))
            .value("title", lit("Again"));

        let error = query::insert(&driver, &metrics, &env, &duplicate)
            .await
            .unwrap_err();
        assert!(
            matches!(&error, Error::Write { collection, .. } if collection == "articles"),
            "{error}"
        );
        assert_eq!(metrics.statements_total.get(), 0);
    }

    #[tokio::test]
    async fn rejected_statements_never_reach_the_database() {
        let driver = CountingDriver::new(create_fixture_driver().await.unwrap())
            .with_dialect(DialectName::Oracle);
        let metrics = fresh_metrics().unwrap();
        let statement = table("articles")
            .select(["id"])
            .field(
                "first_comment",
                Field::expression(subquery(table("comments").select(["comment"]).limit(1))),
            )
            .into();

        let error = execute(&driver, &metrics, DialectName::Oracle, &statement)
            .await
            .unwrap_err();
        assert!(
            matches!(
                error,
                Error::Translation(TranslationError::UnsupportedConstruct { .. })
            ),
            "{error}"
        );
        assert_eq!(driver.statement_count(), 0);
    }

    #[tokio::test]
    async fn statements_must_target_the_driver_dialect() {
        let driver = CountingDriver::new(create_fixture_driver().await.unwrap());
        let metrics = fresh_metrics().unwrap();
        let statement = table("articles").into();

        let error = execute(&driver, &metrics, DialectName::Postgres, &statement)
            .await
            .unwrap_err();
        assert!(
            matches!(
                error,
                Error::DialectMismatch {
                    dialect: DialectName::Postgres,
                    driver: DialectName::Sqlite,
                }
            ),
            "{error}"
        );
        assert_eq!(driver.statement_count(), 0);
    }
}
