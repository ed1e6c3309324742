//! Transfer operations
//!
//! Negotiates the data channel for the four addressing modes. Passive modes
//! connect to the address the server reports; active modes bind a local
//! listener and tell the server where to connect.

use log::{debug, info, warn};
use std::net::{IpAddr, SocketAddr};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use crate::config::ClientConfig;
use crate::control::ControlChannel;
use crate::error::{FtpClientError, FtpResult};
use crate::protocol::responses::{COMMAND_OK, EXTENDED_PASSIVE_MODE, PASSIVE_MODE};
use crate::protocol::{Command, Reply};
use crate::transfer::TransferMode;
use crate::transfer::address::{
    Endpoint, decode_extended, decode_legacy, encode_extended, encode_legacy, protocol_tag,
};
use crate::transfer::data_channel::DataChannel;

/// Issues the negotiation command for `mode` and returns a data channel ready
/// for the next service command.
pub async fn negotiate(
    mode: TransferMode,
    control: &mut ControlChannel,
    config: &ClientConfig,
) -> FtpResult<DataChannel> {
    let channel = match mode {
        TransferMode::Passive => setup_passive_mode(control, config).await?,
        TransferMode::ExtendedPassive => setup_extended_passive_mode(control, config).await?,
        TransferMode::Active => setup_active_mode(control, config, false).await?,
        TransferMode::ExtendedActive => setup_active_mode(control, config, true).await?,
    };

    let event = format!("{} data channel {}", mode.verb(), channel.endpoint());
    info!("{}", event);
    control.record_event(event);
    Ok(channel)
}

/// PASV: expect 227 and connect to the `(h1,h2,h3,h4,p1,p2)` address.
async fn setup_passive_mode(
    control: &mut ControlChannel,
    config: &ClientConfig,
) -> FtpResult<DataChannel> {
    let reply = expect_reply(control, &Command::Pasv, PASSIVE_MODE).await?;

    let mut endpoint = reply
        .parenthesized()
        .ok_or_else(|| FtpClientError::negotiation("no address in reply", Some(reply.clone())))
        .and_then(|encoded| {
            decode_legacy(encoded)
                .map_err(|e| FtpClientError::negotiation(e.to_string(), Some(reply.clone())))
        })?;

    // Some servers behind NAT report 0.0.0.0; the control peer is the only usable host then
    if endpoint.host == "0.0.0.0" {
        endpoint.host = control.peer_addr().ip().to_string();
        debug!("PASV reported unspecified host, using {}", endpoint.host);
    }

    let addr = endpoint
        .socket_addr()
        .map_err(|e| FtpClientError::negotiation(e.to_string(), Some(reply)))?;
    let stream = connect_data(addr, config).await?;
    Ok(DataChannel::Connected { stream, endpoint })
}

/// EPSV: expect 229 and connect to the reported port on the control peer.
async fn setup_extended_passive_mode(
    control: &mut ControlChannel,
    config: &ClientConfig,
) -> FtpResult<DataChannel> {
    let command = Command::Epsv(config.epsv_protocol);
    let reply = expect_reply(control, &command, EXTENDED_PASSIVE_MODE).await?;

    let port = reply
        .parenthesized()
        .ok_or_else(|| FtpClientError::negotiation("no address in reply", Some(reply.clone())))
        .and_then(|encoded| {
            decode_extended(encoded)
                .map_err(|e| FtpClientError::negotiation(e.to_string(), Some(reply.clone())))
        })?
        .port;

    let addr = SocketAddr::new(control.peer_addr().ip(), port);
    let stream = connect_data(addr, config).await?;
    Ok(DataChannel::Connected {
        stream,
        endpoint: Endpoint::from(addr),
    })
}

/// PORT / EPRT: bind a listener on the control connection's local interface
/// and advertise it. The returned channel is accepted after the service command.
async fn setup_active_mode(
    control: &mut ControlChannel,
    config: &ClientConfig,
    extended: bool,
) -> FtpResult<DataChannel> {
    let bind_ip = control.local_addr().ip();
    let bind_addr = SocketAddr::new(bind_ip, 0);
    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|e| FtpClientError::connect_failed(bind_addr, e))?;
    let local = listener
        .local_addr()
        .map_err(|e| FtpClientError::connect_failed(bind_addr, e))?;

    let advertised_ip: IpAddr = config.listen_ip().unwrap_or(bind_ip);
    let endpoint = Endpoint::new(advertised_ip.to_string(), local.port());
    debug!("Listening for data connection on {} (advertised {})", local, endpoint);

    let command = if extended {
        Command::Eprt(encode_extended(protocol_tag(&advertised_ip), &endpoint))
    } else {
        let encoded = encode_legacy(&endpoint).map_err(|_| {
            FtpClientError::negotiation(format!("PORT cannot advertise {}", advertised_ip), None)
        })?;
        Command::Port(encoded)
    };

    expect_reply(control, &command, COMMAND_OK).await?;
    Ok(DataChannel::Listening { listener, endpoint })
}

async fn expect_reply(
    control: &mut ControlChannel,
    command: &Command,
    expected: u16,
) -> FtpResult<Reply> {
    let reply = control.send(command).await?;
    if reply.code != expected {
        warn!("{} refused: {}", command.verb(), reply);
        return Err(FtpClientError::negotiation(
            format!("{} expected {}", command.verb(), expected),
            Some(reply),
        ));
    }
    Ok(reply)
}

async fn connect_data(addr: SocketAddr, config: &ClientConfig) -> FtpResult<TcpStream> {
    debug!("Connecting data channel to {}", addr);
    match timeout(config.data_timeout(), TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(FtpClientError::connect_failed(addr, e)),
        Err(_) => {
            warn!("Data connect to {} timed out", addr);
            Err(FtpClientError::data_timeout(addr))
        }
    }
}
