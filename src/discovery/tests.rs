#[cfg(test)]
mod tests {
    use crate::discovery::{
        is_web_port, parse_main_pid, parse_ss_output, parse_unit_list, ports_for_pid, CommandRunner,
        PortBinding, PortScanner, RetryPolicy, SsPorts, SystemctlUnits, UnitLister,
    };
    use crate::error::DiscoveryError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    const SYSTEMCTL_OUTPUT: &str = "\
UNIT                      LOAD   ACTIVE   SUB     DESCRIPTION
nginx.service             loaded active   running A high performance web server
ssh.service               loaded active   running OpenBSD Secure Shell server
postgresql.service        loaded inactive dead    PostgreSQL RDBMS
broken.service            loaded failed   failed
sockets.target            loaded active   active  Sockets
dev-sda1.device           loaded active   plugged WDC_WD10EZEX

LOAD   = Reflects whether the unit definition was properly loaded.
ACTIVE = The high-level unit activation state, i.e. generalization of SUB.
SUB    = The low-level unit activation state, values depend on unit type.

4 loaded units listed.
";

    const SS_OUTPUT: &str = "\
State  Recv-Q Send-Q Local Address:Port  Peer Address:Port Process
LISTEN 0      511          0.0.0.0:80         0.0.0.0:*     users:((\"nginx\",pid=1234,fd=6))
LISTEN 0      128          0.0.0.0:22         0.0.0.0:*     users:((\"sshd\",pid=5678,fd=3))
LISTEN 0      4096       127.0.0.1:8080       0.0.0.0:*     users:((\"myapp\",pid=4242,fd=9))
LISTEN 0      511             [::]:443           [::]:*     users:((\"nginx\",pid=1234,fd=7))
LISTEN 0      4096   127.0.0.53%lo:53         0.0.0.0:*
";

    fn fast_runner() -> CommandRunner {
        CommandRunner::new(Duration::from_secs(5), RetryPolicy::none())
    }

    #[test]
    fn test_parse_unit_list() {
        let units = parse_unit_list(SYSTEMCTL_OUTPUT);

        assert_eq!(units.len(), 4);
        assert_eq!(units[0].name, "nginx.service");
        assert_eq!(units[0].run_state, "active");
        assert_eq!(units[0].description, "A high performance web server");
        assert_eq!(units[2].name, "postgresql.service");
        assert_eq!(units[2].run_state, "inactive");
        assert_eq!(units[3].name, "broken.service");
        assert_eq!(units[3].run_state, "failed");
        assert_eq!(units[3].description, "");
    }

    #[test]
    fn test_parse_unit_list_skips_noise() {
        assert!(parse_unit_list("").is_empty());
        assert!(parse_unit_list("\n\n   \n").is_empty());
        assert!(parse_unit_list("UNIT LOAD ACTIVE SUB DESCRIPTION").is_empty());
        assert!(parse_unit_list("short.service loaded").is_empty());
    }

    #[test]
    fn test_parse_main_pid() {
        assert_eq!(parse_main_pid("MainPID=1234\n"), Some(1234));
        assert_eq!(parse_main_pid("MainPID=0\n"), None);
        assert_eq!(parse_main_pid(""), None);
        assert_eq!(parse_main_pid("MainPID=\n"), None);
        assert_eq!(parse_main_pid("Id=x.service\nMainPID=77\n"), Some(77));
    }

    #[test]
    fn test_parse_ss_output() {
        let bindings = parse_ss_output(SS_OUTPUT);

        assert_eq!(
            bindings,
            vec![
                PortBinding::new(80, 1234),
                PortBinding::new(22, 5678),
                PortBinding::new(8080, 4242),
                PortBinding::new(443, 1234),
            ]
        );
    }

    #[test]
    fn test_parse_ss_output_skips_lines_without_pid_or_port() {
        let output = "\
u_str LISTEN 0 4096 /run/systemd/private 13937 * 0 users:((\"systemd\",pid=1,fd=14))
LISTEN 0 128 0.0.0.0:5432 0.0.0.0:*
garbage line
";
        assert!(parse_ss_output(output).is_empty());
    }

    #[test]
    fn test_parse_ss_output_takes_pid_from_users_field() {
        let output = "\
LISTEN 0 511 0.0.0.0:8080 0.0.0.0:* users:((\"stupid=1\",pid=42,fd=6))
LISTEN 0 511 0.0.0.0:3000 0.0.0.0:* users:((\"node\",pid=7001,fd=20),(\"node\",pid=7002,fd=20))
LISTEN 0 511 0.0.0.0:9000 0.0.0.0:* cgroup:pid=99
";
        assert_eq!(
            parse_ss_output(output),
            vec![PortBinding::new(8080, 42), PortBinding::new(3000, 7001)]
        );
    }

    #[test]
    fn test_is_web_port() {
        for port in [80, 443, 3000, 3999, 4000, 4999, 5000, 5999, 8000, 8080, 8999, 9000, 9999] {
            assert!(is_web_port(port), "{} should be a web port", port);
        }

        for port in [0, 22, 53, 79, 81, 442, 444, 2999, 6000, 6379, 7999, 10000, 65535] {
            assert!(!is_web_port(port), "{} should not be a web port", port);
        }
    }

    #[test]
    fn test_is_web_port_matches_ranges_exhaustively() {
        for port in 0..=u16::MAX {
            let expected = port == 80
                || port == 443
                || (3000..=5999).contains(&port)
                || (8000..=9999).contains(&port);
            assert_eq!(is_web_port(port), expected, "port {}", port);
        }
    }

    #[test]
    fn test_ports_for_pid() {
        let bindings = parse_ss_output(SS_OUTPUT);

        let nginx = ports_for_pid(&bindings, 1234);
        assert_eq!(nginx, vec![PortBinding::new(80, 1234), PortBinding::new(443, 1234)]);

        assert!(ports_for_pid(&bindings, 9999).is_empty());
        assert!(ports_for_pid(&[], 1234).is_empty());
    }

    #[test]
    fn test_retry_policy_delay() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
        };

        assert_eq!(policy.delay(1), Duration::from_millis(100));
        assert_eq!(policy.delay(2), Duration::from_millis(200));
        assert_eq!(policy.delay(3), Duration::from_millis(400));
        assert_eq!(policy.delay(4), Duration::from_millis(500)); // Capped at max_delay
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_policy_retries_transient_failures() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
        };

        let call_count = Arc::new(AtomicU32::new(0));
        let counter = call_count.clone();

        let result = policy
            .run("flaky", move || {
                let count = counter.clone();
                async move {
                    let current = count.fetch_add(1, Ordering::SeqCst) + 1;
                    if current < 2 {
                        Err(DiscoveryError::Failed {
                            program: "flaky".to_string(),
                            status: "exit code 1".to_string(),
                            stderr: String::new(),
                        })
                    } else {
                        Ok("success")
                    }
                }
            })
            .await;

        assert_eq!(result, Ok("success"));
        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_policy_stops_on_permanent_failure() {
        let policy = RetryPolicy {
            max_attempts: 5,
            ..RetryPolicy::default()
        };

        let call_count = Arc::new(AtomicU32::new(0));
        let counter = call_count.clone();

        let result: Result<(), DiscoveryError> = policy
            .run("missing", move || {
                let count = counter.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Err(DiscoveryError::MissingTool {
                        program: "missing".to_string(),
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(DiscoveryError::MissingTool { .. })));
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_runner_captures_stdout() {
        let output = fast_runner().run("sh", &["-c", "echo hello"]).await;
        assert_eq!(output, Ok("hello\n".to_string()));
    }

    #[tokio::test]
    async fn test_runner_reports_missing_tool() {
        let result = fast_runner().run("svcreg-no-such-binary", &[]).await;
        assert!(matches!(result, Err(DiscoveryError::MissingTool { .. })));
    }

    #[tokio::test]
    async fn test_runner_reports_non_zero_exit() {
        let result = fast_runner()
            .run("sh", &["-c", "echo boom >&2; exit 3"])
            .await;

        match result {
            Err(DiscoveryError::Failed { status, stderr, .. }) => {
                assert_eq!(status, "exit code 3");
                assert_eq!(stderr, "boom");
            }
            other => panic!("Unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_runner_enforces_timeout() {
        let runner = CommandRunner::new(Duration::from_millis(100), RetryPolicy::none());
        let result = runner.run("sleep", &["5"]).await;
        assert!(matches!(result, Err(DiscoveryError::TimedOut { .. })));
    }

    #[tokio::test]
    async fn test_systemctl_units_missing_binary() {
        let lister = SystemctlUnits::new("svcreg-no-such-systemctl", fast_runner());

        assert!(matches!(
            lister.list_units().await,
            Err(DiscoveryError::MissingTool { .. })
        ));
        assert!(matches!(
            lister.main_pid("nginx.service").await,
            Err(DiscoveryError::MissingTool { .. })
        ));
    }

    #[tokio::test]
    async fn test_ss_ports_missing_binary() {
        let scanner = SsPorts::new("svcreg-no-such-ss", fast_runner());

        assert!(matches!(
            scanner.list_listening_ports().await,
            Err(DiscoveryError::MissingTool { .. })
        ));
    }
}
