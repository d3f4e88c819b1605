//! DHCPv6 message handling for a single client
//!
//! Every message is answered on its own; nothing is remembered between
//! packets. Solicit gets an Advertise unless the client asked for rapid
//! commit, everything else a client sends gets a Reply.

use dhcproto::v6::{DhcpOption, Message, MessageType, OptionCode, Status, StatusCode};
use dhcproto::{Decodable, Encodable};
use podnet_core::{Error, Result};

use crate::modifiers::Modifier;

/// An encoded response ready to send
#[derive(Debug, Clone)]
pub struct Response {
    /// Type of the message being answered
    pub request_type: MessageType,
    /// Type of the answer
    pub reply_type: MessageType,
    /// Encoded answer
    pub bytes: Vec<u8>,
}

/// Builds responses from a fixed list of modifiers
#[derive(Debug, Clone)]
pub struct Responder {
    modifiers: Vec<Modifier>,
}

impl Responder {
    /// Create a responder applying `modifiers` to every response
    #[must_use]
    pub const fn new(modifiers: Vec<Modifier>) -> Self {
        Self { modifiers }
    }

    /// Modifiers applied to each response
    #[must_use]
    pub fn modifiers(&self) -> &[Modifier] {
        &self.modifiers
    }

    /// Decode `packet` and build the encoded answer
    ///
    /// Returns `Ok(None)` for messages this server must not answer.
    ///
    /// # Errors
    /// Returns [`Error::Protocol`] if the packet cannot be decoded or the
    /// response cannot be built
    pub fn respond(&self, packet: &[u8]) -> Result<Option<Response>> {
        let request = Message::from_bytes(packet)
            .map_err(|e| Error::protocol(format!("malformed message: {e}")))?;

        let Some(response) = self.build_response(&request)? else {
            return Ok(None);
        };

        let bytes = response
            .to_vec()
            .map_err(|e| Error::protocol(format!("encoding {:?}: {e}", response.msg_type())))?;

        Ok(Some(Response {
            request_type: request.msg_type(),
            reply_type: response.msg_type(),
            bytes,
        }))
    }

    /// Build the answer to `request`
    ///
    /// # Errors
    /// Returns [`Error::Protocol`] if the request has no client identifier
    pub fn build_response(&self, request: &Message) -> Result<Option<Message>> {
        let Some(reply_type) = response_type(request) else {
            tracing::debug!(msg_type = ?request.msg_type(), "Ignoring message type");
            return Ok(None);
        };

        let client_id = match request.opts().get(OptionCode::ClientId) {
            Some(DhcpOption::ClientId(duid)) => duid.clone(),
            _ => return Err(Error::protocol("missing client identifier")),
        };

        let mut response = Message::new(reply_type);
        response.set_xid(request.xid());
        response.opts_mut().insert(DhcpOption::ClientId(client_id));

        for modifier in &self.modifiers {
            modifier.apply(request, &mut response);
        }

        match request.msg_type() {
            MessageType::Solicit if reply_type == MessageType::Reply => {
                response.opts_mut().insert(DhcpOption::RapidCommit);
            }
            MessageType::Release | MessageType::Decline => {
                response.opts_mut().insert(DhcpOption::StatusCode(StatusCode {
                    status: Status::Success,
                    msg: String::new(),
                }));
            }
            _ => {}
        }

        tracing::debug!(
            msg_type = ?request.msg_type(),
            reply_type = ?reply_type,
            xid = ?request.xid(),
            "Built DHCPv6 response"
        );

        Ok(Some(response))
    }
}

/// Answer type for `request`, `None` for messages only servers or relays send
#[must_use]
pub fn response_type(request: &Message) -> Option<MessageType> {
    match request.msg_type() {
        MessageType::Solicit if request.opts().get(OptionCode::RapidCommit).is_none() => {
            Some(MessageType::Advertise)
        }
        MessageType::Advertise
        | MessageType::Reply
        | MessageType::Reconfigure
        | MessageType::RelayForw
        | MessageType::RelayRepl => None,
        _ => Some(MessageType::Reply),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modifiers::{build_modifiers, duid_ll, LEASE_LIFETIME_SECS};
    use dhcproto::v6::{DhcpOptions, IANA};
    use podnet_core::MacAddress;
    use std::net::Ipv6Addr;

    const CLIENT_DUID: [u8; 10] = [0, 3, 0, 1, 0x52, 0x54, 0, 0x12, 0x34, 0x56];

    fn server_mac() -> MacAddress {
        MacAddress::new([0x02, 0x00, 0x00, 0xab, 0xcd, 0x01])
    }

    fn responder() -> Responder {
        Responder::new(build_modifiers(
            "fd00::5".parse().unwrap(),
            server_mac(),
            vec!["fd00::53".parse().unwrap()],
        ))
    }

    fn message(msg_type: MessageType) -> Message {
        let mut msg = Message::new(msg_type);
        msg.set_xid([0x12, 0x34, 0x56]);
        msg.opts_mut().insert(DhcpOption::ClientId(CLIENT_DUID.to_vec()));
        msg.opts_mut().insert(DhcpOption::IANA(IANA {
            id: 42,
            t1: 0,
            t2: 0,
            opts: DhcpOptions::new(),
        }));
        msg
    }

    fn reply_to(msg: &Message) -> Message {
        let response = responder().respond(&msg.to_vec().unwrap()).unwrap().unwrap();
        Message::from_bytes(&response.bytes).unwrap()
    }

    #[test]
    fn test_solicit_gets_advertise() {
        let reply = reply_to(&message(MessageType::Solicit));

        assert_eq!(reply.msg_type(), MessageType::Advertise);
        assert_eq!(reply.xid(), [0x12, 0x34, 0x56]);
        assert!(reply.opts().get(OptionCode::RapidCommit).is_none());
    }

    #[test]
    fn test_rapid_commit_solicit_gets_reply() {
        let mut solicit = message(MessageType::Solicit);
        solicit.opts_mut().insert(DhcpOption::RapidCommit);

        let reply = reply_to(&solicit);

        assert_eq!(reply.msg_type(), MessageType::Reply);
        assert!(reply.opts().get(OptionCode::RapidCommit).is_some());
    }

    #[test]
    fn test_other_client_messages_get_reply() {
        for msg_type in [
            MessageType::Request,
            MessageType::Renew,
            MessageType::Rebind,
            MessageType::Confirm,
            MessageType::InformationRequest,
        ] {
            assert_eq!(reply_to(&message(msg_type)).msg_type(), MessageType::Reply);
        }
    }

    #[test]
    fn test_release_gets_success_status() {
        for msg_type in [MessageType::Release, MessageType::Decline] {
            let reply = reply_to(&message(msg_type));

            assert_eq!(reply.msg_type(), MessageType::Reply);
            let Some(DhcpOption::StatusCode(status)) = reply.opts().get(OptionCode::StatusCode)
            else {
                panic!("status code missing");
            };
            assert_eq!(status.status, Status::Success);
        }
    }

    #[test]
    fn test_response_carries_identity_and_lease() {
        let reply = reply_to(&message(MessageType::Request));

        assert_eq!(
            reply.opts().get(OptionCode::ClientId),
            Some(&DhcpOption::ClientId(CLIENT_DUID.to_vec()))
        );
        assert_eq!(
            reply.opts().get(OptionCode::ServerId),
            Some(&DhcpOption::ServerId(duid_ll(server_mac())))
        );
        assert_eq!(
            reply.opts().get(OptionCode::DomainNameServers),
            Some(&DhcpOption::DomainNameServers(vec![
                "fd00::53".parse::<Ipv6Addr>().unwrap()
            ]))
        );

        let Some(DhcpOption::IANA(iana)) = reply.opts().get(OptionCode::IANA) else {
            panic!("IA_NA missing");
        };
        assert_eq!(iana.id, 42);
        let Some(DhcpOption::IAAddr(addr)) = iana.opts.get(OptionCode::IAAddr) else {
            panic!("IA address missing");
        };
        assert_eq!(addr.addr, "fd00::5".parse::<Ipv6Addr>().unwrap());
        assert_eq!(addr.valid_life, LEASE_LIFETIME_SECS);
    }

    #[test]
    fn test_renew_naming_previous_server_gets_reply() {
        // Server DUID of the interface before the pod was recreated
        let previous = MacAddress::new([0x02, 0x00, 0x00, 0xab, 0xcd, 0x02]);
        let mut renew = message(MessageType::Renew);
        renew
            .opts_mut()
            .insert(DhcpOption::ServerId(duid_ll(previous)));

        let reply = reply_to(&renew);

        assert_eq!(reply.msg_type(), MessageType::Reply);
        assert_eq!(
            reply.opts().get(OptionCode::ServerId),
            Some(&DhcpOption::ServerId(duid_ll(server_mac())))
        );
        let Some(DhcpOption::IANA(iana)) = reply.opts().get(OptionCode::IANA) else {
            panic!("IA_NA missing");
        };
        assert!(matches!(
            iana.opts.get(OptionCode::IAAddr),
            Some(DhcpOption::IAAddr(lease)) if lease.addr == "fd00::5".parse::<Ipv6Addr>().unwrap()
        ));
    }

    #[test]
    fn test_ignores_server_messages() {
        for msg_type in [MessageType::Advertise, MessageType::Reply, MessageType::RelayForw] {
            assert!(responder()
                .build_response(&message(msg_type))
                .unwrap()
                .is_none());
        }
    }

    #[test]
    fn test_malformed_and_anonymous_requests_fail() {
        assert!(matches!(
            responder().respond(&[0x01]),
            Err(Error::Protocol { .. })
        ));

        let anonymous = Message::new(MessageType::Solicit);
        assert!(matches!(
            responder().build_response(&anonymous),
            Err(Error::Protocol { .. })
        ));
    }
}
