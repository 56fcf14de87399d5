//! End-to-end tests against in-process RDAP and WHOIS servers.

mod common;

use common::{active_record, registry, MockRdap, MockWhois};
use domain_watch_lib::{
    CheckConfig, DomainChecker, DomainStatus, Monitor, MonitorConfig, QueryMethod,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(60 * 60);

fn test_config() -> MonitorConfig {
    MonitorConfig::default().with_timeout(Duration::from_secs(5))
}

fn assert_ttl_near(ttl: Option<Duration>, expected: Duration) {
    let ttl = ttl.expect("result should be cached");
    assert!(ttl <= expected, "ttl {:?} exceeds {:?}", ttl, expected);
    assert!(
        ttl > expected - MINUTE,
        "ttl {:?} too far below {:?}",
        ttl,
        expected
    );
}

#[tokio::test]
async fn test_not_found_then_active_emits_one_change() {
    let rdap = MockRdap::start().await;
    let whois = MockWhois::start().await;
    let monitor = Monitor::new(test_config(), Arc::new(registry(&rdap, &whois))).unwrap();
    let mut events = monitor.take_events().unwrap();

    // RDAP 404: available, cached for 30 minutes, first observation is silent
    let info = monitor.get_domain_info("drop.test").await;
    assert_eq!(info.status, DomainStatus::Available);
    assert_eq!(info.query_method, Some(QueryMethod::Rdap));
    assert_ttl_near(monitor.cached_ttl("drop.test"), 30 * MINUTE);
    assert_err!(events.try_recv());

    // served from cache without another request
    let requests = rdap.requests();
    let cached = monitor.get_domain_info("drop.test").await;
    assert_eq!(cached.status, DomainStatus::Available);
    assert_eq!(rdap.requests(), requests);

    // now registered, expiring in 90 days
    rdap.respond("drop.test", 200, &active_record("drop.test", 90));
    let info = monitor.force_check("drop.test").await;
    assert_eq!(info.status, DomainStatus::Registered);
    assert_eq!(info.name_servers, vec!["ns1.example.net"]);
    assert!(info.expiry_date.is_some());
    assert_ttl_near(monitor.cached_ttl("drop.test"), 24 * HOUR);

    let event = assert_ok!(events.try_recv());
    assert_eq!(event.domain, "drop.test");
    assert_eq!(event.old_status, DomainStatus::Available);
    assert_eq!(event.new_status, DomainStatus::Registered);
    assert_err!(events.try_recv());
}

#[tokio::test]
async fn test_near_expiry_registration_gets_short_ttl() {
    let rdap = MockRdap::start().await;
    let whois = MockWhois::start().await;
    rdap.respond("soon.test", 200, &active_record("soon.test", 2));

    let monitor = Monitor::new(test_config(), Arc::new(registry(&rdap, &whois))).unwrap();
    let info = monitor.get_domain_info("soon.test").await;
    assert_eq!(info.status, DomainStatus::Registered);
    assert_ttl_near(monitor.cached_ttl("soon.test"), 6 * HOUR);
}

#[tokio::test]
async fn test_rdap_server_error_falls_back_to_whois() {
    let rdap = MockRdap::start().await;
    let whois = MockWhois::start().await;
    rdap.respond("gone.test", 503, "service unavailable");
    whois.respond(
        "gone.test",
        "Domain Name: gone.test\r\nRegistrar: Example Registrar, Inc.\r\nStatus: pending delete\r\n",
    );

    let monitor = Monitor::new(test_config(), Arc::new(registry(&rdap, &whois))).unwrap();
    let info = monitor.get_domain_info("gone.test").await;

    assert_eq!(info.status, DomainStatus::PendingDelete);
    assert_eq!(info.query_method, Some(QueryMethod::Whois));
    assert_eq!(whois.queries(), 1);
    assert_ttl_near(monitor.cached_ttl("gone.test"), 5 * MINUTE);
}

#[tokio::test]
async fn test_whois_only_tld() {
    let rdap = MockRdap::start().await;
    let whois = MockWhois::start().await;
    let mut routes = registry(&rdap, &whois);
    routes.remove_rdap(common::TEST_TLD);

    let checker = DomainChecker::new(
        CheckConfig::default().with_timeout(Duration::from_secs(5)),
        Arc::new(routes),
    )
    .unwrap();

    let info = checker.check_domain("Free.TEST").await;
    assert_eq!(info.name, "free.test");
    assert_eq!(info.status, DomainStatus::Available);
    assert_eq!(info.query_method, Some(QueryMethod::Whois));
    assert_eq!(rdap.requests(), 0);
}

#[tokio::test]
async fn test_both_protocols_failing_is_an_error_result() {
    let rdap = MockRdap::start().await;
    let whois = MockWhois::start().await;
    rdap.respond("broken.test", 500, "oops");
    let mut routes = registry(&rdap, &whois);
    // nothing listens on port 1
    routes.set_whois(
        common::TEST_TLD,
        domain_watch_lib::WhoisServer::new("127.0.0.1", 1),
    );

    let monitor = Monitor::new(test_config(), Arc::new(routes)).unwrap();
    let mut events = monitor.take_events().unwrap();

    let info = monitor.get_domain_info("broken.test").await;
    assert_eq!(info.status, DomainStatus::Error);
    let message = info.error_message.unwrap();
    assert!(message.contains("RDAP"), "{}", message);
    assert!(message.contains("WHOIS"), "{}", message);
    assert_ttl_near(monitor.cached_ttl("broken.test"), 10 * MINUTE);
    assert!(monitor.last_known_statuses().is_empty());
    assert_err!(events.try_recv());
}

#[tokio::test]
async fn test_batch_of_500_keeps_input_order() {
    let rdap = MockRdap::start().await;
    let whois = MockWhois::start().await;

    let domains: Vec<String> = (0..500).map(|i| format!("d{:03}.test", i)).collect();
    for domain in domains.iter().step_by(2) {
        rdap.respond(domain, 200, &active_record(domain, 365));
    }

    let checker = DomainChecker::new(
        CheckConfig::default()
            .with_concurrent_limit(50)
            .with_timeout(Duration::from_secs(10)),
        Arc::new(registry(&rdap, &whois)),
    )
    .unwrap();

    let results = checker.check_domains(&domains).await;
    assert_eq!(results.len(), 500);
    for (i, (info, domain)) in results.iter().zip(&domains).enumerate() {
        assert_eq!(&info.name, domain);
        let expected = if i % 2 == 0 {
            DomainStatus::Registered
        } else {
            DomainStatus::Available
        };
        assert_eq!(info.status, expected, "{}", domain);
    }
    assert_eq!(rdap.requests(), 500);
}

#[tokio::test]
async fn test_check_cycle_detects_changes_and_snapshots() {
    let rdap = MockRdap::start().await;
    let whois = MockWhois::start().await;
    rdap.respond("a.test", 200, &active_record("a.test", 365));

    let monitor = Monitor::new(test_config(), Arc::new(registry(&rdap, &whois))).unwrap();
    let mut events = monitor.take_events().unwrap();
    assert_eq!(
        monitor.set_domains(&["a.test".to_string(), "b.test".to_string()]),
        2
    );

    let first = monitor.check_all().await;
    assert_eq!(first[0].status, DomainStatus::Registered);
    assert_eq!(first[1].status, DomainStatus::Available);
    assert_err!(events.try_recv());

    rdap.respond("b.test", 200, &active_record("b.test", 365));
    monitor.check_all().await;

    let event = assert_ok!(events.try_recv());
    assert_eq!(event.domain, "b.test");
    assert_eq!(event.new_status, DomainStatus::Registered);
    assert_err!(events.try_recv());

    // snapshot is fresh, so no further requests
    let requests = rdap.requests();
    let all = monitor.get_all_domain_info().await;
    assert_eq!(all.len(), 2);
    assert_eq!(rdap.requests(), requests);

    let stats = monitor.stats();
    assert_eq!(stats.domain_count, 2);
    assert_eq!(stats.tracked_domains, 2);
    assert_eq!(stats.status_counts.get(&DomainStatus::Registered), Some(&2));
}
