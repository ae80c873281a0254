use thiserror::Error;

/// Tamanho do cabeçalho ICMP (type, code, checksum, identifier, sequence).
pub const ICMP_HEADER_LEN: usize = 8;

/// Maior payload que cabe num datagrama IPv4 (65535 - 20 IP - 8 ICMP).
pub const MAX_PAYLOAD: usize = 65_507;

pub const ECHO_REPLY: u8 = 0;
pub const DESTINATION_UNREACHABLE: u8 = 3;
pub const ECHO_REQUEST: u8 = 8;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("ICMP frame too short: {len} bytes (minimum 8)")]
    Malformed { len: usize },
    #[error("ICMP checksum mismatch: stored {stored:#06x}, computed {computed:#06x}")]
    Checksum { stored: u16, computed: u16 },
}

/// Classificação do frame pelo campo type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    EchoReply,
    EchoRequest,
    DestinationUnreachable,
    Other(u8),
}

/// Mensagem ICMP decodificada. Para mensagens de erro (type 3) os campos
/// identifier/sequence carregam os 4 bytes "unused" do cabeçalho.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoFrame {
    pub icmp_type: u8,
    pub code: u8,
    pub checksum: u16,
    pub identifier: u16,
    pub sequence: u16,
    pub payload: Vec<u8>,
}

impl EchoFrame {
    pub fn kind(&self) -> FrameKind {
        match self.icmp_type {
            ECHO_REPLY => FrameKind::EchoReply,
            ECHO_REQUEST => FrameKind::EchoRequest,
            DESTINATION_UNREACHABLE => FrameKind::DestinationUnreachable,
            other => FrameKind::Other(other),
        }
    }

    /// Tamanho do frame no fio (cabeçalho + payload).
    pub fn wire_len(&self) -> usize {
        ICMP_HEADER_LEN + self.payload.len()
    }
}

/// Calcula o checksum ICMP (RFC 792).
pub fn checksum(mut data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    while data.len() >= 2 {
        sum = sum.wrapping_add(u16::from_be_bytes([data[0], data[1]]) as u32);
        data = &data[2..];
    }
    // Byte ímpar no final é completado com zero
    if !data.is_empty() {
        sum = sum.wrapping_add((data[0] as u32) << 8);
    }
    while (sum >> 16) != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !(sum as u16)
}

/// Monta um pacote ICMPv4 Echo Request (type=8, code=0).
pub fn encode(ident: u16, seq: u16, payload: &[u8]) -> Vec<u8> {
    encode_message(ECHO_REQUEST, 0, ident, seq, payload)
}

/// Monta uma mensagem ICMPv4 qualquer com cabeçalho de 8 bytes.
pub fn encode_message(icmp_type: u8, code: u8, ident: u16, seq: u16, payload: &[u8]) -> Vec<u8> {
    let mut pkt = Vec::with_capacity(ICMP_HEADER_LEN + payload.len());

    // Type, Code e checksum zerado durante o cálculo
    pkt.extend_from_slice(&[icmp_type, code, 0, 0]);
    pkt.extend_from_slice(&ident.to_be_bytes());
    pkt.extend_from_slice(&seq.to_be_bytes());
    pkt.extend_from_slice(payload);

    let csum = checksum(&pkt);
    pkt[2..4].copy_from_slice(&csum.to_be_bytes());

    pkt
}

/// Decodifica uma mensagem ICMP. O checksum é validado antes de qualquer
/// campo ser interpretado.
pub fn decode(bytes: &[u8]) -> Result<EchoFrame, CodecError> {
    if bytes.len() < ICMP_HEADER_LEN {
        return Err(CodecError::Malformed { len: bytes.len() });
    }

    let stored = u16::from_be_bytes([bytes[2], bytes[3]]);
    // Soma sobre o frame inteiro com o checksum incluído: o resultado é zero
    // quando o frame está íntegro.
    if checksum(bytes) != 0 {
        let mut zeroed = bytes.to_vec();
        zeroed[2] = 0;
        zeroed[3] = 0;
        return Err(CodecError::Checksum {
            stored,
            computed: checksum(&zeroed),
        });
    }

    Ok(EchoFrame {
        icmp_type: bytes[0],
        code: bytes[1],
        checksum: stored,
        identifier: u16::from_be_bytes([bytes[4], bytes[5]]),
        sequence: u16::from_be_bytes([bytes[6], bytes[7]]),
        payload: bytes[ICMP_HEADER_LEN..].to_vec(),
    })
}

/// Pula o cabeçalho IPv4 quando presente. Sockets RAW (e sockets DGRAM no
/// macOS) entregam o datagrama IP inteiro; detecta pela versão e usa o IHL.
pub fn strip_ipv4_header(datagram: &[u8]) -> &[u8] {
    if datagram.len() >= 20 && (datagram[0] >> 4) == 4 {
        let ihl = (datagram[0] & 0x0F) as usize * 4;
        if ihl >= 20 && datagram.len() >= ihl {
            return &datagram[ihl..];
        }
    }
    datagram
}

/// Extrai (identifier, sequence) do Echo Request citado dentro de uma
/// mensagem de erro ICMP: cabeçalho IP original + 8 primeiros bytes do ICMP.
/// O checksum citado não é verificado.
pub fn quoted_echo(error_payload: &[u8]) -> Option<(u16, u16)> {
    if error_payload.len() < 20 || (error_payload[0] >> 4) != 4 {
        return None;
    }
    let inner = strip_ipv4_header(error_payload);
    if inner.len() == error_payload.len() || inner.len() < ICMP_HEADER_LEN {
        return None;
    }
    if inner[0] != ECHO_REQUEST {
        return None;
    }
    Some((
        u16::from_be_bytes([inner[4], inner[5]]),
        u16::from_be_bytes([inner[6], inner[7]]),
    ))
}

/// Payload padrão: byte i vale i mod 256.
pub fn fill_payload(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i & 0xFF) as u8).collect()
}
