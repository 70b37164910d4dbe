//! JSON-lines host loop.

use std::io::{BufRead, Write};

use tracing::{debug, warn};

use crate::protocol::{Request, Response};
use crate::PlaybackService;

/// Answer one line of input.
///
/// A line that is not a valid request yields an `InvalidArgument` reply
/// rather than ending the loop.
pub fn handle_line(service: &PlaybackService, line: &str) -> Response {
    match serde_json::from_str::<Request>(line) {
        Ok(request) => service.handle(request),
        Err(e) => {
            warn!("Malformed request: {e}");
            Response::error(None, "InvalidArgument", format!("Malformed request: {e}"))
        }
    }
}

/// Read requests from `reader` until EOF, writing one reply line per request.
pub fn serve<R: BufRead, W: Write>(
    service: &PlaybackService,
    reader: R,
    mut writer: W,
) -> std::io::Result<()> {
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let response = handle_line(service, &line);
        serde_json::to_writer(&mut writer, &response)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }

    debug!("Input closed, leaving serve loop");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::protocol::Outcome;
    use std::sync::Arc;
    use vibrato_audio::mixer::mixer;
    use vibrato_audio::PlaybackSession;

    fn run(input: &str) -> Vec<Response> {
        let (_mixer, handle) = mixer(64);
        let service = PlaybackService::new(Arc::new(PlaybackSession::new(Arc::new(handle))));
        let mut output = Vec::new();
        serve(&service, input.as_bytes(), &mut output).unwrap();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_one_reply_per_request() {
        let replies = run(concat!(
            "{\"id\": 1, \"method\": \"listStreams\"}\n",
            "\n",
            "not json\n",
            "{\"id\": \"x\", \"method\": \"pauseStream\", \"args\": {\"id\": \"00000000-0000-0000-0000-000000000000\"}}\n",
        ));
        assert_eq!(replies.len(), 3);

        assert_eq!(replies[0].id, Some(serde_json::json!(1)));
        assert_eq!(replies[0].outcome, Outcome::Result(serde_json::json!({})));

        match &replies[1].outcome {
            Outcome::Error(e) => assert_eq!(e.code, "InvalidArgument"),
            Outcome::Result(_) => panic!("malformed line accepted"),
        }

        match &replies[2].outcome {
            Outcome::Error(e) => assert_eq!(e.code, "NotImplemented"),
            Outcome::Result(_) => panic!("pause succeeded"),
        }
    }
}
