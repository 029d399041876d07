//! `test-utils` is used for testing in both `tagsweep-lib` and `tagsweep`.
//! This crate does not depend on `tagsweep-lib` or `tagsweep`, else we would get dependency cycles.
//! Macros are used instead, so that the importer is responsible for providing the dependencies
//! (`wiremock` and `serde_json`).

/// Start a mock tag directory.
///
/// Serves `GET /items` in pages of the given size, chained through
/// `marker` query parameters, and `GET /items/{name}/tags` for every item.
/// The handle of an item is `handle-{name}`.
///
/// ```ignore
/// let server = mock_directory!(2;
///     "alice" => [("team", "infra")],
///     "bob" => [],
/// );
/// ```
#[macro_export]
macro_rules! mock_directory {
    ($page_size:expr; $( $name:expr => [ $( ($key:expr, $value:expr) ),* $(,)? ] ),* $(,)?) => {{
        let mock_server = wiremock::MockServer::start().await;
        #[allow(unused_mut)]
        let mut entries: Vec<(String, Vec<(String, String)>)> = Vec::new();
        $(
            entries.push((
                $name.to_string(),
                vec![ $( ($key.to_string(), $value.to_string()) ),* ],
            ));
        )*

        let page_size: usize = $page_size;
        let pages: Vec<&[(String, Vec<(String, String)>)]> = if entries.is_empty() {
            vec![&entries[..]]
        } else {
            entries.chunks(page_size.max(1)).collect()
        };

        for (index, page) in pages.iter().enumerate() {
            let items: Vec<serde_json::Value> = page
                .iter()
                .map(|(name, _)| serde_json::json!({"name": name, "handle": format!("handle-{name}")}))
                .collect();
            let more = index + 1 < pages.len();
            let mut body = serde_json::json!({"items": items, "is_truncated": more});
            if more {
                body["marker"] = serde_json::json!(format!("page-{}", index + 1));
            }

            let mock = wiremock::Mock::given(wiremock::matchers::method("GET"))
                .and(wiremock::matchers::path("/items"));
            let mock = if index == 0 {
                mock.and(wiremock::matchers::query_param_is_missing("marker"))
            } else {
                mock.and(wiremock::matchers::query_param("marker", format!("page-{index}")))
            };
            mock.respond_with(wiremock::ResponseTemplate::new(200).set_body_json(body))
                .mount(&mock_server)
                .await;
        }

        for (name, tags) in &entries {
            let tags: Vec<serde_json::Value> = tags
                .iter()
                .map(|(key, value)| serde_json::json!({"key": key, "value": value}))
                .collect();
            wiremock::Mock::given(wiremock::matchers::method("GET"))
                .and(wiremock::matchers::path(format!("/items/{name}/tags")))
                .respond_with(
                    wiremock::ResponseTemplate::new(200)
                        .set_body_json(serde_json::json!({"tags": tags})),
                )
                .mount(&mock_server)
                .await;
        }

        mock_server
    }};
}

/// Make the tag lookup of one item on a mock directory fail with `status`.
///
/// With a trailing count, only the first `n` lookups fail and later ones
/// fall through to the regular response.
#[macro_export]
macro_rules! mock_failing_tags {
    ($server:expr, $name:expr, $status:expr) => {{
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path(format!("/items/{}/tags", $name)))
            .respond_with(wiremock::ResponseTemplate::new($status))
            .with_priority(1)
            .mount(&$server)
            .await;
    }};
    ($server:expr, $name:expr, $status:expr, $times:expr) => {{
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path(format!("/items/{}/tags", $name)))
            .respond_with(wiremock::ResponseTemplate::new($status))
            .with_priority(1)
            .up_to_n_times($times)
            .mount(&$server)
            .await;
    }};
}

/// Make the request for the second page of a mock directory fail with
/// `status`, so enumeration stops after the first page.
#[macro_export]
macro_rules! mock_failing_pages {
    ($server:expr, $status:expr) => {{
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/items"))
            .and(wiremock::matchers::query_param("marker", "page-1"))
            .respond_with(wiremock::ResponseTemplate::new($status))
            .with_priority(1)
            .mount(&$server)
            .await;
    }};
}
