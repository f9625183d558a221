use std::str::FromStr;

use goblin_core::LeaseManager;
use hickory_proto::op::{Message, MessageType, OpCode, ResponseCode};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{Name, RData, Record, RecordType};
use hickory_proto::serialize::binary::{BinDecodable, BinEncodable};
use tracing::{debug, warn};

const IGNORED_QUERY: &str = "_dns.resolver.arpa";

/// Decodes one DNS query, resolves every question against `manager`, and
/// encodes the reply. Returns `None` when the datagram should be silently
/// dropped: malformed input, the resolver-probe query every OS issues on
/// occasion, or a message that ends up with zero answers across all of its
/// questions (no NXDOMAIN is ever sent).
pub async fn handle_query(data: &[u8], domain: &str, manager: &LeaseManager) -> Option<Vec<u8>> {
    let request = Message::from_bytes(data).ok()?;

    if request.op_code() != OpCode::Query || request.message_type() != MessageType::Query {
        return None;
    }

    if request.queries().is_empty() {
        return None;
    }

    let mut response = Message::new();
    response.set_id(request.id());
    response.set_message_type(MessageType::Response);
    response.set_op_code(OpCode::Query);
    response.set_recursion_desired(request.recursion_desired());
    response.set_recursion_available(true);
    response.set_response_code(ResponseCode::NoError);

    for q in request.queries() {
        response.add_query(q.clone());
    }

    for query in request.queries() {
        if query.query_type() != RecordType::A {
            continue;
        }

        let qname = query.name().to_string();
        let qname_trimmed = qname.trim_end_matches('.').to_lowercase();

        if qname_trimmed == IGNORED_QUERY {
            continue;
        }

        let Some(subdomain) = extract_subdomain(&qname_trimmed, domain) else {
            continue;
        };

        debug!(%qname, %subdomain, "dns query");

        let ip = match manager.resolve(&subdomain).await {
            Ok(ip) => ip,
            Err(e) => {
                debug!(%subdomain, error = %e, "no record for subdomain, dropping");
                continue;
            }
        };

        let name = match Name::from_str(&qname) {
            Ok(name) => name,
            Err(e) => {
                warn!(%qname, error = %e, "failed to re-parse query name");
                continue;
            }
        };
        response.add_answer(Record::from_rdata(name, 0, RData::A(A(ip))));
    }

    if response.answers().is_empty() {
        return None;
    }

    response.to_bytes().ok()
}

/// Requires the query name to be a subdomain of `domain`, then strips an
/// optional leading `www.` label and returns the next (first remaining)
/// label.
fn extract_subdomain(qname_trimmed: &str, domain: &str) -> Option<String> {
    let suffix = format!(".{domain}");
    if !qname_trimmed.ends_with(&suffix) {
        return None;
    }

    let candidate = qname_trimmed
        .strip_prefix("www.")
        .unwrap_or(qname_trimmed);

    let subdomain = candidate.split('.').next()?;
    if subdomain.is_empty() || subdomain == domain {
        return None;
    }
    Some(subdomain.to_string())
}
