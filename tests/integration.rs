//! End-to-end tests against an in-process mock directory: a loopback
//! `TcpListener` that hand-encodes LDAPMessage responses instead of a
//! real server. Each test starts its own listener, so they don't
//! interfere with each other.

mod common;

use std::time::Duration;

use tokio::io::AsyncWriteExt;

use ldap_client::{Client, DerefAliases, LdapConnSettings, LdapError, ReconnectPolicy, Scope};

#[tokio::test]
async fn simple_bind_succeeds() {
    let (listener, url) = common::listen().await;
    let server = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        common::read_request(&mut sock).await;
        sock.write_all(&common::result_response(1, 1, 0))
            .await
            .unwrap();
    });

    let client = Client::new(url, LdapConnSettings::new());
    let result = client
        .simple_bind("cn=admin,dc=example,dc=org", "secret")
        .await
        .unwrap();
    assert!(result.is_success());

    server.await.unwrap();
}

#[tokio::test]
async fn compare_maps_result_codes() {
    let (listener, url) = common::listen().await;
    let server = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        for (id, rc) in [(1i32, 6i64), (2, 5), (3, 32)] {
            common::read_request(&mut sock).await;
            sock.write_all(&common::result_response(id, 15, rc))
                .await
                .unwrap();
        }
    });

    let client = Client::new(url, LdapConnSettings::new());

    let equal = client
        .compare("cn=foo,dc=example,dc=org", "cn", "foo")
        .await
        .unwrap()
        .equal()
        .unwrap();
    assert!(equal);

    let not_equal = client
        .compare("cn=foo,dc=example,dc=org", "cn", "bar")
        .await
        .unwrap()
        .equal()
        .unwrap();
    assert!(!not_equal);

    let missing = client
        .compare("cn=nobody,dc=example,dc=org", "cn", "foo")
        .await;
    assert!(missing.is_err());

    server.await.unwrap();
}

#[tokio::test]
async fn search_collects_entries_then_done() {
    let (listener, url) = common::listen().await;
    let server = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        common::read_request(&mut sock).await;
        for i in 0..3 {
            let dn = format!("cn=user{i},dc=example,dc=org");
            sock.write_all(&common::search_entry_response(
                1,
                &dn,
                &[("cn", &format!("user{i}"))],
            ))
            .await
            .unwrap();
        }
        sock.write_all(&common::result_response(1, 5, 0))
            .await
            .unwrap();
    });

    let client = Client::new(url, LdapConnSettings::new());
    let (entries, result) = client
        .search_all(
            "dc=example,dc=org",
            Scope::Subtree,
            "(objectClass=*)",
            vec!["cn".to_string()],
        )
        .await
        .unwrap();
    assert_eq!(entries.len(), 3);
    assert!(result.is_success());

    server.await.unwrap();
}

#[tokio::test]
async fn paged_search_drains_three_pages() {
    let (listener, url) = common::listen().await;
    let server = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        for page in 0..3 {
            common::read_request(&mut sock).await;
            for i in 0..4 {
                let dn = format!("cn=page{page}-{i},dc=example,dc=org");
                sock.write_all(&common::search_entry_response(1, &dn, &[]))
                    .await
                    .unwrap();
            }
            let cookie: &[u8] = if page < 2 { b"more" } else { b"" };
            sock.write_all(&common::search_done_paged(1, 0, cookie))
                .await
                .unwrap();
        }
    });

    let client = Client::new(url, LdapConnSettings::new());
    let mut stream = client
        .search_paged(
            "dc=example,dc=org",
            Scope::Subtree,
            DerefAliases::Never,
            false,
            "(objectClass=*)",
            Vec::new(),
            4,
        )
        .await
        .unwrap();

    let mut count = 0;
    let result = loop {
        match stream.next_item().await.expect("stream ended early") {
            ldap_client::SearchItem::Entry(_) => count += 1,
            ldap_client::SearchItem::Done(result) => break result,
            ldap_client::SearchItem::Error(msg) => panic!("search error: {msg}"),
        }
    };
    assert_eq!(count, 12);
    assert!(result.is_success());

    server.await.unwrap();
}

#[tokio::test]
async fn pending_add_completes_once_connection_comes_up() {
    // Reserve a port, then drop the listener so the actor's first dial
    // fails with connection-refused and falls into backoff.
    let addr = {
        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        probe.local_addr().unwrap()
    };
    let url = format!("ldap://{addr}");

    let settings = LdapConnSettings::new().set_reconnect(ReconnectPolicy {
        initial_delay: Duration::from_millis(20),
        max_delay: Duration::from_millis(20),
        fail_after: None,
    });
    let client = Client::new(url, settings);

    let add_client = client.clone();
    let add = tokio::spawn(async move {
        add_client
            .add(
                "cn=foo,dc=example,dc=org",
                vec![("objectClass", vec!["top"])],
            )
            .await
    });

    // Give the actor a couple of failed dial attempts before the
    // listener comes up, so the add genuinely waits on a retry.
    tokio::time::sleep(Duration::from_millis(80)).await;
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    let server = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        common::read_request(&mut sock).await;
        sock.write_all(&common::result_response(1, 9, 0))
            .await
            .unwrap();
    });

    let result = add.await.unwrap().unwrap();
    assert!(result.is_success());

    server.await.unwrap();
}

#[tokio::test]
async fn request_times_out_when_server_stays_silent() {
    let (listener, url) = common::listen().await;
    let server = tokio::spawn(async move {
        let (_sock, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let settings = LdapConnSettings::new().set_request_timeout(Duration::from_millis(50));
    let client = Client::new(url, settings);

    let result = client.delete("cn=foo,dc=example,dc=org").await;
    match result {
        Err(LdapError::RequestTimeout(_)) => {}
        other => panic!("expected a request timeout, got {other:?}"),
    }

    server.abort();
}
