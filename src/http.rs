use std::thread;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(30);
const ATTEMPTS: usize = 3;
const RETRY_DELAY: Duration = Duration::from_millis(500);

fn should_retry_http_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..=599).contains(&status)
}

/// Fetch a remote playlist body with the default timeout/retry policy.
pub(crate) fn fetch_playlist_text(url: &str) -> Result<String, String> {
    get_text_with_retries(url, CONNECT_TIMEOUT, READ_TIMEOUT, ATTEMPTS, RETRY_DELAY)
}

pub(crate) fn get_text_with_retries(
    url: &str,
    connect_timeout: Duration,
    read_timeout: Duration,
    attempts: usize,
    retry_delay: Duration,
) -> Result<String, String> {
    let attempts = attempts.max(1);

    for attempt in 1..=attempts {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(connect_timeout)
            .timeout_read(read_timeout)
            .timeout_write(read_timeout)
            .build();

        match agent.get(url).call() {
            Ok(response) => match response.into_string() {
                Ok(body) => return Ok(body),
                Err(err) => {
                    return Err(format!("request failed: response decode failed: {err}"));
                }
            },
            Err(ureq::Error::Status(status, response)) => {
                let response_body = response.into_string().ok().unwrap_or_default();
                let body = response_body.trim();
                let status_error = if body.is_empty() {
                    format!("HTTP status {status}")
                } else {
                    let truncated = body.chars().take(240).collect::<String>();
                    format!("HTTP status {status} ({truncated})")
                };

                if should_retry_http_status(status) && attempt < attempts {
                    thread::sleep(retry_delay);
                    continue;
                }

                if should_retry_http_status(status) {
                    return Err(format!(
                        "request failed after {attempts} attempt(s): {status_error}"
                    ));
                }

                return Err(format!("request failed: {status_error}"));
            }
            Err(ureq::Error::Transport(err)) => {
                let transport_error = format!("transport error: {err}");
                if attempt < attempts {
                    thread::sleep(retry_delay);
                    continue;
                }
                return Err(format!(
                    "request failed after {attempts} attempt(s): {transport_error}"
                ));
            }
        }
    }

    Err("request failed: exhausted attempts without a concrete error".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread::JoinHandle;

    /// Serve the scripted responses in order on an ephemeral port, then stop
    /// listening. Joining the handle yields how many requests were served, so
    /// a test hangs (instead of passing vacuously) if the client under test
    /// makes fewer requests than the script expects.
    fn serve_script(script: Vec<(u16, &'static str)>) -> (String, JoinHandle<usize>) {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind test listener");
        let url = format!("http://{}", listener.local_addr().expect("local addr"));

        let handle = std::thread::spawn(move || {
            let mut served = 0;
            for (status, body) in script {
                let Ok((mut stream, _)) = listener.accept() else {
                    break;
                };
                // A local GET arrives in one segment; drain it and respond.
                let mut request = [0_u8; 1024];
                let _ = stream.read(&mut request);
                let _ = write!(
                    stream,
                    "HTTP/1.1 {status} X\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.flush();
                served += 1;
            }
            served
        });
        (url, handle)
    }

    fn fetch(url: &str, attempts: usize) -> Result<String, String> {
        get_text_with_retries(
            url,
            Duration::from_millis(200),
            Duration::from_millis(200),
            attempts,
            Duration::from_millis(1),
        )
    }

    #[test]
    fn transient_server_errors_are_retried_until_the_body_arrives() {
        let (url, server) = serve_script(vec![(500, "boom"), (429, "slow down"), (200, "#EXTM3U")]);

        assert_eq!(fetch(&url, 3).expect("third attempt succeeds"), "#EXTM3U");
        assert_eq!(server.join().expect("server thread"), 3);
    }

    #[test]
    fn a_missing_playlist_is_not_retried() {
        let (url, server) = serve_script(vec![(404, "no such list")]);

        let err = fetch(&url, 5).expect_err("404 is final");
        assert!(err.contains("HTTP status 404"), "unexpected error: {err}");
        assert!(!err.contains("attempt"), "404 must not be retried: {err}");
        assert_eq!(server.join().expect("server thread"), 1);
    }

    #[test]
    fn exhausted_retries_report_the_attempt_count() {
        let (url, server) = serve_script(vec![(503, "down"), (503, "still down")]);

        let err = fetch(&url, 2).expect_err("both attempts fail");
        assert!(
            err.contains("after 2 attempt(s)") && err.contains("HTTP status 503"),
            "unexpected error: {err}"
        );
        assert_eq!(server.join().expect("server thread"), 2);
    }
}
