// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use society_api::HttpGateway;
use society_app::{ActorId, BodyEncoding, Flat, Gateway, GatewayExt, PageRequest};
use std::io::Read;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tiny_http::{Header, Response, Server};

#[derive(Debug)]
struct Captured {
    method: String,
    url: String,
    actor_headers: Vec<(String, String)>,
    content_type: String,
    body: String,
}

/// Serves `replies` in order, one per request, and hands back what it saw.
fn mock_server(replies: Vec<(u16, &'static str)>) -> Result<(String, JoinHandle<Vec<Captured>>)> {
    let server =
        Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
    let addr = format!("http://{}/api", server.server_addr());

    let handle = thread::spawn(move || {
        let mut seen = Vec::new();
        for (status, body) in replies {
            let mut request = server.recv().expect("request expected");
            let mut received = String::new();
            request
                .as_reader()
                .read_to_string(&mut received)
                .expect("request body should read");

            let header = |name: &'static str| {
                request
                    .headers()
                    .iter()
                    .find(|header| header.field.equiv(name))
                    .map(|header| header.value.as_str().to_owned())
            };
            let actor_headers = ["CreatedBy", "ModifiedBy", "DeletedBy"]
                .into_iter()
                .filter_map(|name| header(name).map(|value| (name.to_owned(), value)))
                .collect();
            seen.push(Captured {
                method: request.method().to_string(),
                url: request.url().to_owned(),
                actor_headers,
                content_type: header("Content-Type").unwrap_or_default(),
                body: received,
            });

            let response = Response::from_string(body)
                .with_status_code(status)
                .with_header(
                    Header::from_bytes("Content-Type", "application/json")
                        .expect("valid content type header"),
                );
            request.respond(response).expect("response should succeed");
        }
        seen
    });

    Ok((addr, handle))
}

#[test]
fn unreachable_server_names_the_config_key() {
    let gateway = HttpGateway::new("http://127.0.0.1:1/api", Duration::from_millis(50))
        .expect("gateway should initialize");

    let error = gateway
        .fetch_all_json("Flat")
        .expect_err("fetch should fail for unreachable endpoint");
    let message = error.to_string();
    assert!(message.contains("cannot reach http://127.0.0.1:1/api"));
    assert!(message.contains("[server].base_url"));
}

#[test]
fn reads_decode_lists_single_rows_and_pages() -> Result<()> {
    let (addr, handle) = mock_server(vec![
        (200, r#"[{"id":1,"flatNo":"A-101"},{"id":2,"flatNo":"A-102"}]"#),
        (200, r#"{"id":2,"flatNo":"A-102","isActive":false}"#),
        (
            200,
            r#"{"items":[{"id":3,"flatNo":"B-101"}],"totalCount":7,"totalPages":4}"#,
        ),
    ])?;

    let gateway = HttpGateway::new(&addr, Duration::from_secs(2))?;
    let flats: Vec<Flat> = gateway.fetch_all("Flat")?;
    assert_eq!(flats.len(), 2);

    let flat: Flat = gateway.fetch_by_id("Flat", "2")?;
    assert!(!flat.is_active);

    let page = gateway.fetch_paged::<Flat>("Flat", PageRequest { number: 2, size: 2 })?;
    assert_eq!(page.items[0].flat_no, "B-101");
    assert_eq!(page.total_count, 7);
    assert_eq!(page.total_pages, 4);

    let seen = handle.join().map_err(|_| anyhow!("server thread panicked"))?;
    let urls: Vec<&str> = seen.iter().map(|c| c.url.as_str()).collect();
    assert_eq!(
        urls,
        vec!["/api/Flat", "/api/Flat/2", "/api/Flat?pageNumber=2&pageSize=2"]
    );
    assert!(seen.iter().all(|c| c.method == "GET" && c.actor_headers.is_empty()));
    Ok(())
}

#[test]
fn writes_carry_the_actor_as_a_header() -> Result<()> {
    let (addr, handle) = mock_server(vec![(201, r#"{"id":55}"#), (204, ""), (200, "")])?;
    let gateway = HttpGateway::new(&addr, Duration::from_secs(2))?;
    let actor = ActorId::new("42");
    let payload = serde_json::json!({ "flatNo": "C-301", "societyId": 1 });

    let created = gateway.create("Flat", &payload, &actor, BodyEncoding::Json)?;
    assert_eq!(created.status, 201);
    assert_eq!(created.created_id(), Some(55));

    let updated = gateway.update("Flat", "55", &payload, &actor, BodyEncoding::Json)?;
    assert_eq!(updated.status, 204);
    assert!(updated.body.is_null());

    gateway.remove("Flat", "55", &ActorId::anonymous())?;

    let seen = handle.join().map_err(|_| anyhow!("server thread panicked"))?;
    assert_eq!(seen[0].method, "POST");
    assert_eq!(
        seen[0].actor_headers,
        vec![("CreatedBy".to_owned(), "42".to_owned())]
    );
    let sent: serde_json::Value = serde_json::from_str(&seen[0].body)?;
    assert_eq!(sent, payload);

    assert_eq!(seen[1].method, "PUT");
    assert_eq!(seen[1].url, "/api/Flat/55");
    assert_eq!(
        seen[1].actor_headers,
        vec![("ModifiedBy".to_owned(), "42".to_owned())]
    );

    assert_eq!(seen[2].method, "DELETE");
    assert_eq!(
        seen[2].actor_headers,
        vec![("DeletedBy".to_owned(), "0".to_owned())]
    );
    Ok(())
}

#[test]
fn multipart_writes_send_one_part_per_field() -> Result<()> {
    let (addr, handle) = mock_server(vec![(200, "")])?;
    let gateway = HttpGateway::new(&addr, Duration::from_secs(2))?;
    let payload = serde_json::json!({
        "flatNo": "D-101",
        "areaSqFt": 950.5,
        "owner": null,
    });

    gateway.create("Flat", &payload, &ActorId::new("9"), BodyEncoding::Multipart)?;

    let seen = handle.join().map_err(|_| anyhow!("server thread panicked"))?;
    assert!(seen[0].content_type.starts_with("multipart/form-data"));
    assert!(seen[0].body.contains("name=\"flatNo\""));
    assert!(seen[0].body.contains("D-101"));
    assert!(seen[0].body.contains("950.5"));
    assert!(!seen[0].body.contains("name=\"owner\""));
    Ok(())
}

#[test]
fn failures_surface_cleaned_server_messages() -> Result<()> {
    let (addr, handle) = mock_server(vec![
        (409, r#"{"message":"flat has meter readings"}"#),
        (500, "<html><body>Internal Server Error</body></html>"),
    ])?;
    let gateway = HttpGateway::new(&addr, Duration::from_secs(2))?;

    let conflict = gateway
        .remove("Flat", "3", &ActorId::new("1"))
        .expect_err("delete should fail");
    assert_eq!(
        conflict.to_string(),
        "server error (409): flat has meter readings"
    );

    let crash = gateway
        .fetch_by_id_json("Flat", "3")
        .expect_err("fetch should fail");
    assert_eq!(crash.to_string(), "server returned 500");

    handle.join().map_err(|_| anyhow!("server thread panicked"))?;
    Ok(())
}

#[test]
fn ping_accepts_client_errors_but_not_server_errors() -> Result<()> {
    let (addr, handle) = mock_server(vec![(404, ""), (503, "maintenance")])?;
    let gateway = HttpGateway::new(&addr, Duration::from_secs(2))?;

    gateway.ping()?;
    let error = gateway.ping().expect_err("503 should fail");
    assert_eq!(error.to_string(), "server error (503): maintenance");

    handle.join().map_err(|_| anyhow!("server thread panicked"))?;
    Ok(())
}
