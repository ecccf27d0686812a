// End-to-end checks of the public routing and dispatch API
#[cfg(test)]
mod test {
    use std::{net::SocketAddr, sync::Arc};

    use bytes::Bytes;
    use http::{Request, Response, StatusCode, header};
    use restroute::{
        DispatchOutcome, Dispatcher, FilterRejection, PathOptions, RequestDescriptor, RouteError,
        RouteTable, describe_request, negotiate, network_matches,
    };

    #[test]
    fn test_users_scenario() {
        let mut table = RouteTable::new();
        table
            .add_controller("users", "users")
            .unwrap()
            .add_action("GET", "<id>", "show")
            .unwrap()
            .parameter("id", r"\d+")
            .unwrap();
        let compiled = table.freeze();

        let m = table.match_route("GET", "users/7").expect("users/7 matches");
        assert_eq!(m.parameters, vec!["7"]);
        assert!(table.match_route("GET", "users/seven").is_none());
        assert!(table.match_route("POST", "users/7").is_none());

        // Freezing again hands back the same table.
        assert!(Arc::ptr_eq(&compiled, &table.freeze()));
    }

    #[test]
    fn test_network_forms() {
        for (base, len, outside) in [
            ("10.0.0.0", 8, "11.0.0.1"),
            ("192.168.4.0", 22, "192.168.8.1"),
            ("172.16.5.4", 32, "172.16.5.5"),
            ("0.0.0.0", 1, "128.0.0.1"),
        ] {
            let spec = format!("{base}/{len}");
            assert!(network_matches(base, &spec), "{spec} contains its base");
            assert!(!network_matches(outside, &spec), "{spec} excludes {outside}");
        }

        assert!(network_matches("192.168.0.1", "192.168.0.*"));
        assert!(network_matches("192.168.0.255", "192.168.0.*"));
        assert!(!network_matches("192.168.1.1", "192.168.0.*"));

        assert!(network_matches("10.0.0.7", "10.0.0.5-10.0.0.10"));
        assert!(!network_matches("10.0.0.11", "10.0.0.5-10.0.0.10"));

        assert!(!network_matches("10.0.0.7", "10.0.0.300"));
        assert!(!network_matches("localhost", "127.0.0.1"));
    }

    #[test]
    fn test_negotiation_wildcard_fallback() {
        assert_eq!(
            negotiate(&["application/xml", "*/*"], &["application/json"]),
            Some("application/json".to_string())
        );
    }

    #[test]
    fn test_registration_errors() {
        let mut table = RouteTable::new();
        table.add_controller("users", "users").unwrap();
        assert!(matches!(
            table.add_controller("people", "users"),
            Err(RouteError::DuplicateName { .. })
        ));

        let users = table.controller_mut("users").unwrap();
        users.add_action("GET", "", "list").unwrap();
        assert!(matches!(
            users.add_action("GET", "all", "list"),
            Err(RouteError::DuplicateName { .. })
        ));

        let action = users.add_action("GET", "<id>", "show").unwrap();
        action.set_ip_allow(["10.0.0.0/8"]).unwrap();
        assert_eq!(
            action.set_ip_deny(["10.0.0.1"]).err(),
            Some(RouteError::ConflictingPolicy)
        );
    }

    #[test]
    fn test_diagnose_reports_same_shape_only() {
        let mut table = RouteTable::new();
        let items = table.add_controller("", "items").unwrap();
        items.add_action("GET", "items/<id>", "show").unwrap();
        items.add_action("GET", "items/<name>", "by_name").unwrap();
        items.add_action("POST", "items/<id>", "update").unwrap();

        let conflicts = table.diagnose();
        assert_eq!(conflicts.len(), 1);
        assert!(conflicts[0].contains("items::show"));
        assert!(conflicts[0].contains("items::by_name"));
        assert!(!conflicts[0].contains("update"));

        // Diagnosing does not change which route wins.
        assert_eq!(table.match_route("GET", "items/abc").unwrap().action, "show");
    }

    fn api() -> Dispatcher {
        let mut table = RouteTable::new();
        table
            .register_filter_fn("api_key", |request, _| {
                if request.accept.iter().any(|a| a == "text/csv") {
                    Err(FilterRejection::new(StatusCode::PAYMENT_REQUIRED, "exports are a paid feature"))
                } else {
                    Ok(())
                }
            })
            .unwrap();
        table
            .defaults_mut()
            .unwrap()
            .set_allowed_content_types(["application/json", "text/csv"])
            .unwrap();

        let reports = table.add_controller("reports", "reports").unwrap();
        reports.set_filters(["api_key"]).unwrap();
        reports.set_ip_deny(["203.0.113.*"]).unwrap();
        reports
            .add_action("GET", "<year>/<slug>", "show")
            .unwrap()
            .parameter("year", r"\d{4}")
            .unwrap();
        reports
            .add_action("DELETE", "<year>/<slug>", "remove")
            .unwrap()
            .set_https_only(true)
            .unwrap();

        let mut dispatcher = Dispatcher::new(table.freeze(), table.filters());
        dispatcher
            .register_handler_fn("reports", "show", |ctx| {
                let body = format!(
                    "{}:{}",
                    ctx.route.param("year").unwrap_or_default(),
                    ctx.route.param("slug").unwrap_or_default()
                );
                Ok(Response::new(Bytes::from(body)))
            })
            .unwrap();
        dispatcher
    }

    fn http_request(method: &str, uri: &str, accept: Option<&str>) -> Request<()> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(accept) = accept {
            builder = builder.header(header::ACCEPT, accept);
        }
        builder.body(()).unwrap()
    }

    #[test]
    fn test_http_requests_through_dispatcher() {
        let dispatcher = api();
        let options = PathOptions {
            base_path: "/api".to_string(),
            version: Some("v2".to_string()),
            trust_forwarded: false,
        };
        let peer: SocketAddr = "198.51.100.4:40000".parse().unwrap();
        let blocked: SocketAddr = "203.0.113.50:40000".parse().unwrap();

        let req = http_request("GET", "/api/v2/reports/2024/q%20one", Some("application/json"));
        let descriptor = describe_request(&req, Some(peer), &options);
        let response = dispatcher.handle(&descriptor).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body(), &Bytes::from_static(b"2024:q one"));
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");

        let statuses = [
            (http_request("GET", "/api/v2/reports/24/x", None), peer, StatusCode::NOT_FOUND),
            (http_request("GET", "/api/v2/reports/2024/x", None), blocked, StatusCode::FORBIDDEN),
            (
                http_request("GET", "/api/v2/reports/2024/x", Some("text/html")),
                peer,
                StatusCode::NOT_ACCEPTABLE,
            ),
            (
                http_request("GET", "/api/v2/reports/2024/x", Some("text/csv")),
                peer,
                StatusCode::PAYMENT_REQUIRED,
            ),
            (http_request("DELETE", "/api/v2/reports/2024/x", None), peer, StatusCode::FORBIDDEN),
            (
                http_request("DELETE", "https://api.example.com/api/v2/reports/2024/x", None),
                peer,
                StatusCode::NOT_IMPLEMENTED,
            ),
        ];
        for (req, addr, status) in statuses {
            let descriptor = describe_request(&req, Some(addr), &options);
            assert_eq!(dispatcher.handle(&descriptor).unwrap().status(), status, "{descriptor:?}");
        }
    }

    #[test]
    fn test_resolve_outcomes_are_values() {
        let dispatcher = api();
        let request = RequestDescriptor::new("GET", "reports/2024/annual").with_client_ip("198.51.100.4");

        match dispatcher.resolve(&request) {
            DispatchOutcome::Routed {
                route,
                content_type,
            } => {
                assert_eq!(route.controller, "reports");
                assert_eq!(route.parameters, vec!["2024", "annual"]);
                assert_eq!(content_type, "application/json");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        assert_eq!(
            dispatcher.resolve(&request.clone().with_accept(["text/csv"])),
            DispatchOutcome::Rejected(FilterRejection::new(
                StatusCode::PAYMENT_REQUIRED,
                "exports are a paid feature"
            ))
        );
    }

    #[test]
    fn test_concurrent_matching_after_freeze() {
        let dispatcher = Arc::new(api());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let dispatcher = Arc::clone(&dispatcher);
                std::thread::spawn(move || {
                    let request = RequestDescriptor::new("GET", format!("reports/202{i}/r{i}"));
                    matches!(dispatcher.resolve(&request), DispatchOutcome::Routed { .. })
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }
}
