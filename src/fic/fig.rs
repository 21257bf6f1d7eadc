//! Parsing of the fast information groups carried in each FIB.

use crate::bits::BitReader;
use crate::fic::ensemble::{
    Component,
    ComponentKind,
    DateTime,
    EepProfile,
    Label,
    Protection,
    SubChannel,
};

/// Header byte marking the end of the FIGs in a FIB.
const END_MARKER: u8 = 0xFF;

/// Number of bytes in a label.
const LABEL_BYTES: usize = 16;

/// Decoded fast information group.
#[derive(Clone, Debug, PartialEq)]
pub enum Fig {
    /// FIG 0/0: ensemble identifier and CIF counter.
    EnsembleInfo {
        id: u16,
        /// Configuration change flags.
        change: u8,
        alarm: bool,
        /// CIF counter, modulo 5000.
        cif_count: u16,
    },
    /// FIG 0/1: basic sub-channel organization.
    SubChannels(Vec<SubChannel>),
    /// FIG 0/2: services and their components.
    Services(Vec<(u32, Vec<Component>)>),
    /// FIG 0/9: country, local time offset, and international table.
    Country {
        /// Local time offset in half hours.
        lto: i8,
        /// Extended country code.
        ecc: u8,
        table: Option<u8>,
    },
    /// FIG 0/10: date and time.
    Time(DateTime),
    /// FIG 1/0: ensemble label.
    EnsembleLabel(u16, Label),
    /// FIG 1/1 and 1/5: service label.
    ServiceLabel(u32, Label),
    /// A FIG that isn't decoded, or one describing the next configuration or another
    /// ensemble.
    Other(u8, u8),
}

/// Iterates over the FIGs in the data bytes of a FIB.
pub struct Figs<'a> {
    buf: &'a [u8],
}

impl<'a> Figs<'a> {
    /// Construct a new `Figs` over the given FIB data field, without the CRC.
    pub fn new(buf: &'a [u8]) -> Self {
        Figs { buf: buf }
    }
}

impl<'a> Iterator for Figs<'a> {
    type Item = Fig;

    fn next(&mut self) -> Option<Fig> {
        let (&header, rest) = self.buf.split_first()?;

        if header == END_MARKER {
            return None;
        }

        let kind = header >> 5;
        let len = (header & 0x1F) as usize;

        if len == 0 || len > rest.len() {
            return None;
        }

        let (body, rest) = rest.split_at(len);
        self.buf = rest;

        Some(match kind {
            0 => fig0(body),
            1 => fig1(body),
            _ => Fig::Other(kind, 0),
        })
    }
}

fn fig0(body: &[u8]) -> Fig {
    let cn = body[0] >> 7 & 1 == 1;
    let oe = body[0] >> 6 & 1 == 1;
    let pd = body[0] >> 5 & 1 == 1;
    let ext = body[0] & 0x1F;
    let data = &body[1..];

    let fig = match ext {
        0 => ensemble_info(data),
        1 if !cn && !oe => sub_channels(data),
        2 if !cn && !oe => services(data, pd),
        9 => country(data),
        10 => time(data),
        _ => None,
    };

    fig.unwrap_or(Fig::Other(0, ext))
}

fn ensemble_info(data: &[u8]) -> Option<Fig> {
    let mut r = BitReader::new(data);

    let id = r.read(16)? as u16;
    let change = r.read(2)? as u8;
    let alarm = r.flag()?;
    let hi = r.read(5)? as u16;
    let lo = r.read(8)? as u16;

    Some(Fig::EnsembleInfo {
        id: id,
        change: change,
        alarm: alarm,
        cif_count: hi * 250 + lo,
    })
}

fn sub_channels(data: &[u8]) -> Option<Fig> {
    let mut r = BitReader::new(data);
    let mut subs = vec![];

    while r.remaining() >= 24 {
        let id = r.read(6)? as u8;
        let start = r.read(10)? as u16;

        let (size, protection) = if r.flag()? {
            let option = r.read(3)?;
            let level = r.read(2)? as u8 + 1;
            let size = r.read(10)? as u16;

            let profile = match option {
                0 => EepProfile::A,
                1 => EepProfile::B,
                _ => continue,
            };

            (Some(size), Protection::Eep { profile: profile, level: level })
        } else {
            r.skip(1)?;
            (None, Protection::Uep { index: r.read(6)? as u8 })
        };

        subs.push(SubChannel {
            id: id,
            start: start,
            size: size,
            protection: protection,
        });
    }

    Some(Fig::SubChannels(subs))
}

fn services(data: &[u8], long: bool) -> Option<Fig> {
    let mut r = BitReader::new(data);
    let mut services = vec![];
    let id_bits = if long { 32 } else { 16 };

    while r.remaining() >= id_bits + 8 {
        let id = r.read(id_bits)?;

        r.skip(4)?;
        let count = r.read(4)?;

        let mut comps = Vec::with_capacity(count as usize);

        for _ in 0..count {
            let tmid = r.read(2)?;

            let (kind, sub) = match tmid {
                0b00 => {
                    let ty = r.read(6)? as u8;
                    (ComponentKind::Audio(ty), Some(r.read(6)? as u8))
                },
                0b01 => {
                    let ty = r.read(6)? as u8;
                    (ComponentKind::Data(ty), Some(r.read(6)? as u8))
                },
                0b11 => (ComponentKind::Packet(r.read(12)? as u16), None),
                _ => {
                    r.skip(12)?;
                    (ComponentKind::Reserved, None)
                },
            };

            comps.push(Component {
                kind: kind,
                subchannel: sub,
                primary: r.flag()?,
                ca: r.flag()?,
            });
        }

        services.push((id, comps));
    }

    Some(Fig::Services(services))
}

fn country(data: &[u8]) -> Option<Fig> {
    let mut r = BitReader::new(data);

    r.skip(2)?;
    let negative = r.flag()?;
    let halves = r.read(5)? as i8;
    let ecc = r.read(8)? as u8;
    let table = r.read(8).map(|t| t as u8);

    Some(Fig::Country {
        lto: if negative { -halves } else { halves },
        ecc: ecc,
        table: table,
    })
}

fn time(data: &[u8]) -> Option<Fig> {
    let mut r = BitReader::new(data);

    r.skip(1)?;
    let mjd = r.read(17)?;
    r.skip(2)?;
    let long = r.flag()?;
    let hour = r.read(5)? as u8;
    let minute = r.read(6)? as u8;

    let (second, millis) = if long {
        (r.read(6)? as u8, r.read(10)? as u16)
    } else {
        (0, 0)
    };

    let (year, month, day) = mjd_date(mjd);

    Some(Fig::Time(DateTime {
        year: year,
        month: month,
        day: day,
        hour: hour,
        minute: minute,
        second: second,
        millis: millis,
    }))
}

/// Convert a modified Julian date to a (year, month, day) calendar date.
pub fn mjd_date(mjd: u32) -> (u16, u8, u8) {
    let mjd = mjd as f64;

    let y = ((mjd - 15078.2) / 365.25).floor();
    let m = ((mjd - 14956.1 - (y * 365.25).floor()) / 30.6001).floor();
    let day = mjd - 14956.0 - (y * 365.25).floor() - (m * 30.6001).floor();
    let k = if m == 14.0 || m == 15.0 { 1.0 } else { 0.0 };

    ((y + k + 1900.0) as u16, (m - 1.0 - k * 12.0) as u8, day as u8)
}

fn fig1(body: &[u8]) -> Fig {
    let charset = body[0] >> 4;
    let oe = body[0] >> 3 & 1 == 1;
    let ext = body[0] & 0x7;
    let data = &body[1..];

    if oe {
        return Fig::Other(1, ext);
    }

    let id_bytes = match ext {
        0 | 1 => 2,
        5 => 4,
        _ => return Fig::Other(1, ext),
    };

    if data.len() < id_bytes + LABEL_BYTES + 2 {
        return Fig::Other(1, ext);
    }

    let id = data[..id_bytes].iter().fold(0u32, |id, &b| id << 8 | b as u32);
    let label = label(charset, &data[id_bytes..id_bytes + LABEL_BYTES],
                      crate::bits::slice_u16(&data[id_bytes + LABEL_BYTES..]));

    match ext {
        0 => Fig::EnsembleLabel(id as u16, label),
        _ => Fig::ServiceLabel(id, label),
    }
}

/// EBU Latin based repertoire (EN 300 401 charset 0) as Unicode code points, with 0
/// marking unassigned and control positions.
const EBU_LATIN: [u16; 256] = [
    0x0000, 0x0118, 0x012E, 0x0172, 0x0102, 0x0116, 0x010E, 0x0218,
    0x021A, 0x010A, 0x0000, 0x0000, 0x0120, 0x0139, 0x017B, 0x0143,
    0x0105, 0x0119, 0x012F, 0x0173, 0x0103, 0x0117, 0x010F, 0x0219,
    0x021B, 0x010B, 0x0147, 0x011A, 0x0121, 0x013A, 0x017C, 0x0000,
    0x0020, 0x0021, 0x0022, 0x0023, 0x0142, 0x0025, 0x0026, 0x0027,
    0x0028, 0x0029, 0x002A, 0x002B, 0x002C, 0x002D, 0x002E, 0x002F,
    0x0030, 0x0031, 0x0032, 0x0033, 0x0034, 0x0035, 0x0036, 0x0037,
    0x0038, 0x0039, 0x003A, 0x003B, 0x003C, 0x003D, 0x003E, 0x003F,
    0x0040, 0x0041, 0x0042, 0x0043, 0x0044, 0x0045, 0x0046, 0x0047,
    0x0048, 0x0049, 0x004A, 0x004B, 0x004C, 0x004D, 0x004E, 0x004F,
    0x0050, 0x0051, 0x0052, 0x0053, 0x0054, 0x0055, 0x0056, 0x0057,
    0x0058, 0x0059, 0x005A, 0x005B, 0x016E, 0x005D, 0x0141, 0x005F,
    0x0104, 0x0061, 0x0062, 0x0063, 0x0064, 0x0065, 0x0066, 0x0067,
    0x0068, 0x0069, 0x006A, 0x006B, 0x006C, 0x006D, 0x006E, 0x006F,
    0x0070, 0x0071, 0x0072, 0x0073, 0x0074, 0x0075, 0x0076, 0x0077,
    0x0078, 0x0079, 0x007A, 0x00AB, 0x016F, 0x00BB, 0x013D, 0x0126,
    0x00E1, 0x00E0, 0x00E9, 0x00E8, 0x00ED, 0x00EC, 0x00F3, 0x00F2,
    0x00FA, 0x00F9, 0x00D1, 0x00C7, 0x015E, 0x00DF, 0x00A1, 0x0178,
    0x00E2, 0x00E4, 0x00EA, 0x00EB, 0x00EE, 0x00EF, 0x00F4, 0x00F6,
    0x00FB, 0x00FC, 0x00F1, 0x00E7, 0x015F, 0x011F, 0x0131, 0x00FF,
    0x0136, 0x0145, 0x00A9, 0x0122, 0x011E, 0x011B, 0x0148, 0x0151,
    0x0150, 0x20AC, 0x00A3, 0x0024, 0x0100, 0x0112, 0x012A, 0x016A,
    0x0137, 0x0146, 0x013B, 0x0123, 0x013C, 0x0130, 0x0144, 0x0171,
    0x0170, 0x00BF, 0x013E, 0x00B0, 0x0101, 0x0113, 0x012B, 0x016B,
    0x00C1, 0x00C0, 0x00C9, 0x00C8, 0x00CD, 0x00CC, 0x00D3, 0x00D2,
    0x00DA, 0x00D9, 0x0158, 0x010C, 0x0160, 0x017D, 0x00D0, 0x013F,
    0x00C2, 0x00C4, 0x00CA, 0x00CB, 0x00CE, 0x00CF, 0x00D4, 0x00D6,
    0x00DB, 0x00DC, 0x0159, 0x010D, 0x0161, 0x017E, 0x0111, 0x0140,
    0x00C3, 0x00C5, 0x00C6, 0x0152, 0x0177, 0x00DD, 0x00D5, 0x00D8,
    0x00DE, 0x014A, 0x0154, 0x0106, 0x015A, 0x0179, 0x0166, 0x00F0,
    0x00E3, 0x00E5, 0x00E6, 0x0153, 0x0175, 0x00FD, 0x00F5, 0x00F8,
    0x00FE, 0x014B, 0x0155, 0x0107, 0x015B, 0x017A, 0x0167, 0x0000,
];

fn ebu_latin(b: u8) -> char {
    match EBU_LATIN[b as usize] {
        0 => '\u{FFFD}',
        c => char::from_u32(c as u32).unwrap_or('\u{FFFD}'),
    }
}

/// Decode the characters of a label in the given character set, with the short form
/// made of the characters flagged in `mask`, first character in the MSB.
fn label(charset: u8, bytes: &[u8], mask: u16) -> Label {
    let chars = match charset {
        // ISO 8859-1
        0b0100 => bytes.iter().map(|&b| b as char).collect::<Vec<_>>(),
        // UTF-8
        0b1111 => String::from_utf8_lossy(bytes).chars().collect(),
        // EBU Latin, also used for the sets that aren't supported.
        _ => bytes.iter().map(|&b| ebu_latin(b)).collect(),
    };

    let short = chars.iter().enumerate()
        .filter(|&(i, _)| i < 16 && mask >> (15 - i) & 1 == 1)
        .map(|(_, &c)| c)
        .collect::<String>();

    Label {
        text: chars.iter().collect::<String>().trim_end().to_string(),
        short: short.trim_end().to_string(),
    }
}
