//! Server-Sent Events decoding for provider response bodies
//!
//! Turns a byte stream into a stream of event `data` payloads. Multi-line
//! `data:` fields are joined with `\n`; `event:`, `id:`, `retry:` and
//! comment lines are ignored.

use futures::{Stream, StreamExt};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio_util::io::StreamReader;

struct DecoderState<R> {
    lines: Lines<R>,
    data: String,
    finished: bool,
}

/// Decode SSE `data` payloads from any buffered reader
pub fn data_events<R>(reader: R) -> impl Stream<Item = std::io::Result<String>> + Send
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let state = DecoderState {
        lines: reader.lines(),
        data: String::new(),
        finished: false,
    };

    futures::stream::unfold(state, |mut st| async move {
        if st.finished {
            return None;
        }
        loop {
            match st.lines.next_line().await {
                Ok(Some(line)) => {
                    if line.is_empty() {
                        // Blank line terminates an event
                        if !st.data.is_empty() {
                            let data = std::mem::take(&mut st.data);
                            return Some((Ok(data), st));
                        }
                        continue;
                    }
                    if let Some(rest) = line.strip_prefix("data:") {
                        let rest = rest.strip_prefix(' ').unwrap_or(rest);
                        if !st.data.is_empty() {
                            st.data.push('\n');
                        }
                        st.data.push_str(rest);
                    }
                }
                Ok(None) => {
                    // Flush an event left open at end of body
                    st.finished = true;
                    if st.data.is_empty() {
                        return None;
                    }
                    let data = std::mem::take(&mut st.data);
                    return Some((Ok(data), st));
                }
                Err(e) => {
                    st.finished = true;
                    return Some((Err(e), st));
                }
            }
        }
    })
}

/// Decode SSE `data` payloads from a reqwest response body
pub fn response_data_events(
    response: reqwest::Response,
) -> impl Stream<Item = std::io::Result<String>> + Send {
    let byte_stream = response
        .bytes_stream()
        .map(|result| result.map_err(std::io::Error::other))
        .boxed();
    data_events(BufReader::new(StreamReader::new(byte_stream)))
}
