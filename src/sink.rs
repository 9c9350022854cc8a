//! Sinks receive the sub-metrics produced by an export and deliver them to the agent.
use std::io;
use std::net::{SocketAddr, UdpSocket};

use crate::formatting::write_metric_line;

/// Client side of the DogStatsD protocol.
///
/// Every call may fail with a network or encoding error. Implementations own any buffering
/// they do and must stay usable for the next checkpoint after [`flush`](MetricSink::flush).
pub trait MetricSink {
    fn gauge(&mut self, name: &str, value: f64, tags: &[String], rate: f64) -> io::Result<()>;
    fn count(&mut self, name: &str, value: i64, tags: &[String], rate: f64) -> io::Result<()>;
    fn histogram(&mut self, name: &str, value: f64, tags: &[String], rate: f64) -> io::Result<()>;
    fn distribution(
        &mut self,
        name: &str,
        value: f64,
        tags: &[String],
        rate: f64,
    ) -> io::Result<()>;

    /// Sends anything still buffered.
    fn flush(&mut self) -> io::Result<()>;
}

/// Sends datagrams to a statsd/datadog agent over UDP.
///
/// Metric lines are buffered and sent as soon as the buffer reaches the maximum packet size,
/// or on [`flush`](MetricSink::flush).
#[derive(Debug)]
pub struct UdpSink {
    socket: UdpSocket,
    endpoint: SocketAddr,
    max_packet_size: usize,
    buffer: String,
}

impl UdpSink {
    pub fn new(endpoint: SocketAddr, max_packet_size: usize) -> io::Result<Self> {
        let bind_addr = if endpoint.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(bind_addr)?;
        Ok(UdpSink {
            socket,
            endpoint,
            max_packet_size,
            buffer: String::with_capacity(max_packet_size),
        })
    }

    pub fn endpoint(&self) -> SocketAddr {
        self.endpoint
    }

    fn emit<T>(
        &mut self,
        name: &str,
        mtype: &str,
        value: T,
        tags: &[String],
        rate: f64,
    ) -> io::Result<()>
    where
        T: std::fmt::Display,
    {
        write_metric_line(&mut self.buffer, name, mtype, value, tags, rate);
        if self.buffer.len() >= self.max_packet_size {
            self.flush()
        } else {
            Ok(())
        }
    }
}

impl MetricSink for UdpSink {
    fn gauge(&mut self, name: &str, value: f64, tags: &[String], rate: f64) -> io::Result<()> {
        self.emit(name, "g", value, tags, rate)
    }

    fn count(&mut self, name: &str, value: i64, tags: &[String], rate: f64) -> io::Result<()> {
        self.emit(name, "c", value, tags, rate)
    }

    fn histogram(&mut self, name: &str, value: f64, tags: &[String], rate: f64) -> io::Result<()> {
        self.emit(name, "h", value, tags, rate)
    }

    fn distribution(
        &mut self,
        name: &str,
        value: f64,
        tags: &[String],
        rate: f64,
    ) -> io::Result<()> {
        self.emit(name, "d", value, tags, rate)
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let body = std::mem::replace(
            &mut self.buffer,
            String::with_capacity(self.max_packet_size),
        );
        send_all(&self.socket, &body, &self.endpoint, self.max_packet_size)
    }
}

/// Collects rendered metric lines in memory.
#[derive(Debug, Default)]
pub struct BufferSink {
    buffer: String,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> &str {
        &self.buffer
    }

    /// Returns everything rendered so far and clears the buffer.
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.buffer)
    }
}

impl MetricSink for BufferSink {
    fn gauge(&mut self, name: &str, value: f64, tags: &[String], rate: f64) -> io::Result<()> {
        write_metric_line(&mut self.buffer, name, "g", value, tags, rate);
        Ok(())
    }

    fn count(&mut self, name: &str, value: i64, tags: &[String], rate: f64) -> io::Result<()> {
        write_metric_line(&mut self.buffer, name, "c", value, tags, rate);
        Ok(())
    }

    fn histogram(&mut self, name: &str, value: f64, tags: &[String], rate: f64) -> io::Result<()> {
        write_metric_line(&mut self.buffer, name, "h", value, tags, rate);
        Ok(())
    }

    fn distribution(
        &mut self,
        name: &str,
        value: f64,
        tags: &[String],
        rate: f64,
    ) -> io::Result<()> {
        write_metric_line(&mut self.buffer, name, "d", value, tags, rate);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// Packets are split along new lines because that's how the dogstatsd protocol works
// so we look for \n in the buffer and try to put them together at that delimiter.
fn split_in_packets(buf: &[u8], max_packet_size: usize) -> Vec<(usize, usize)> {
    let mut n_pos_iter = buf.iter();
    let mut last_sent = 0;
    let mut packets = vec![];
    let mut acc = 0;
    let mut previous_acc = acc;

    while let Some(next_send_candidate) = n_pos_iter.position(|&c| c == b'\n') {
        acc += next_send_candidate + 1;
        match acc.cmp(&max_packet_size) {
            std::cmp::Ordering::Less => (), // check if there's a bigger opportunity
            std::cmp::Ordering::Equal => {
                // we can't be any bigger so save this position
                packets.push((last_sent, last_sent + acc));
                last_sent += acc;
                acc = 0;
            }
            std::cmp::Ordering::Greater => {
                // flush what fitted before this line
                if previous_acc != 0 {
                    packets.push((last_sent, last_sent + previous_acc));
                    last_sent += previous_acc;
                    acc = next_send_candidate + 1;
                }

                // a single line over the limit goes out on its own
                if next_send_candidate + 1 > max_packet_size {
                    packets.push((last_sent, last_sent + acc));
                    last_sent += acc;
                    acc = 0;
                }
            }
        }
        previous_acc = acc;
    }

    if acc != 0 {
        packets.push((last_sent, last_sent + acc));
        last_sent += acc;
    }
    // trailing bytes without a final \n
    if last_sent < buf.len() {
        packets.push((last_sent, buf.len()));
    }

    packets
}

fn send_all(
    socket: &UdpSocket,
    body: &str,
    endpoint: &SocketAddr,
    max_packet_size: usize,
) -> io::Result<()> {
    let buf = body.as_bytes();

    let mut sent = 0;
    let mut last_error = None;
    for (start, end) in split_in_packets(buf, max_packet_size) {
        match socket.send_to(&buf[start..end], endpoint) {
            Ok(nsent) => {
                if nsent != (end - start) {
                    tracing::warn!(
                        "udp socket sent less bytes ({}) than it was asked ({})",
                        nsent,
                        end - start
                    );
                }
                sent += nsent;
            }
            Err(e) => {
                // skip this packet and keep sending the others
                tracing::error!("error encountered while sending to {}: {:?}", endpoint, e);
                last_error = Some(e);
            }
        }
    }
    if let Some(e) = last_error {
        return Err(e);
    }
    if sent != buf.len() {
        return Err(io::Error::new(
            io::ErrorKind::Other,
            "sent different size than received",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_split_packet() {
        let data = "123456789\n12345\n678\n";
        let bytes = data.as_bytes();
        let packets = split_in_packets(bytes, 10);
        assert_eq!(packets, [(0, 10), (10, 20)]);

        let bytes = "12345\n".as_bytes();
        let packets = split_in_packets(bytes, 10);
        assert_eq!(packets, [(0, 6)]);

        let data = "123456789\n12345\n6789\n";
        let bytes = data.as_bytes();
        let packets = split_in_packets(bytes, 10);
        assert_eq!(packets, [(0, 10), (10, 16), (16, 21)]);

        let data = "12345";
        let bytes = data.as_bytes();
        let packets = split_in_packets(bytes, 10);
        assert_eq!(packets, [(0, 5)]);
    }

    #[test]
    fn test_split_no_end_newline() {
        let data = "1234\n\
            1234567";
        let packets = split_in_packets(data.as_bytes(), 10);
        assert_eq!(packets, [(0, 5), (5, 12)]);
    }

    #[test]
    fn test_broken_split_packet() {
        // first line is already over max_packet_size
        let data = "123456\n789";
        let packets = split_in_packets(data.as_bytes(), 5);
        assert_eq!(packets, [(0, 7), (7, 10)]);

        // second line over the limit, with another line afterwards
        let data = "789\n123456\n789\n";
        let packets = split_in_packets(data.as_bytes(), 5);
        assert_eq!(packets, [(0, 4), (4, 11), (11, 15)]);
    }

    #[test]
    fn buffer_sink_renders_lines() {
        let mut sink = BufferSink::new();
        let tags = vec!["env:prod".to_string()];
        sink.gauge("g", 1.5, &tags, 1.0).unwrap();
        sink.count("c", 3, &tags, 1.0).unwrap();
        sink.histogram("h", 2.0, &[], 1.0).unwrap();
        sink.distribution("d", 4.0, &[], 1.0).unwrap();
        assert_eq!(
            sink.take(),
            "g:1.5|g|#env:prod\nc:3|c|#env:prod\nh:2|h\nd:4|d\n"
        );
        assert!(sink.contents().is_empty());
    }

    #[test]
    fn udp_sink_delivers_on_flush() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let endpoint = receiver.local_addr().unwrap();

        let mut sink = UdpSink::new(endpoint, 1432).unwrap();
        sink.count("requests", 7, &["region:us".to_string()], 1.0).unwrap();
        sink.gauge("load", 0.25, &[], 1.0).unwrap();
        sink.flush().unwrap();

        let mut buf = [0u8; 1500];
        let n = receiver.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"requests:7|c|#region:us\nload:0.25|g\n");
    }

    #[test]
    fn udp_sink_flushes_full_packets() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let endpoint = receiver.local_addr().unwrap();

        let mut sink = UdpSink::new(endpoint, 10).unwrap();
        // "abc:1|g\n" is 8 bytes, the second line pushes the buffer over 10
        sink.gauge("abc", 1.0, &[], 1.0).unwrap();
        sink.gauge("abc", 2.0, &[], 1.0).unwrap();

        let mut buf = [0u8; 64];
        let n = receiver.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"abc:1|g\n");
        let n = receiver.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"abc:2|g\n");
    }
}
