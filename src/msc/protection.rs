//! Equal error protection profiles of MSC sub-channels.

use crate::coding::puncture::{Puncturing, Segment};
use crate::consts::{CIF_MILLIS, CU_BITS};
use crate::fic::ensemble::EepProfile;

/// Code rate parameters of an EEP sub-channel, where the bitrate is a multiple n of 8
/// kbit/s for profile A or 32 kbit/s for profile B.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct EepParams {
    pub profile: EepProfile,
    /// Protection level 1 through 4.
    pub level: u8,
    /// Size in capacity units.
    pub size: u16,
    /// Bitrate multiple.
    n: u32,
}

impl EepParams {
    /// Derive the parameters of a sub-channel with the given protection and size, or
    /// `None` if the size isn't valid for the profile.
    pub fn new(profile: EepProfile, level: u8, size: u16) -> Option<EepParams> {
        if level < 1 || level > 4 {
            return None;
        }

        let unit = EepParams::unit(profile, level);

        if size == 0 || size as u32 % unit != 0 {
            return None;
        }

        Some(EepParams {
            profile: profile,
            level: level,
            size: size,
            n: size as u32 / unit,
        })
    }

    /// Capacity units per bitrate multiple.
    fn unit(profile: EepProfile, level: u8) -> u32 {
        match profile {
            EepProfile::A => [12, 8, 6, 4][level as usize - 1],
            EepProfile::B => [27, 21, 18, 15][level as usize - 1],
        }
    }

    /// Bitrate in kbit/s.
    pub fn bitrate(&self) -> u32 {
        match self.profile {
            EepProfile::A => 8 * self.n,
            EepProfile::B => 32 * self.n,
        }
    }

    /// Coded bits per CIF.
    pub fn cif_bits(&self) -> usize { self.size as usize * CU_BITS }

    /// Information bits per CIF.
    pub fn frame_bits(&self) -> usize { self.bitrate() as usize * CIF_MILLIS }

    /// Puncturing applied to each CIF's worth of the sub-channel.
    pub fn puncturing(&self) -> Puncturing {
        let n = self.n as usize;

        let (l1, l2, pi1, pi2) = match (self.profile, self.level) {
            (EepProfile::A, 1) => (6 * n - 3, 3, 24, 23),
            (EepProfile::A, 2) if n == 1 => (5, 1, 13, 12),
            (EepProfile::A, 2) => (2 * n - 3, 4 * n + 3, 14, 13),
            (EepProfile::A, 3) => (6 * n - 3, 3, 8, 7),
            (EepProfile::A, _) => (4 * n - 3, 2 * n + 3, 3, 2),
            (EepProfile::B, 1) => (24 * n - 3, 3, 10, 9),
            (EepProfile::B, 2) => (24 * n - 3, 3, 6, 5),
            (EepProfile::B, 3) => (24 * n - 3, 3, 4, 3),
            (EepProfile::B, _) => (24 * n - 3, 3, 2, 1),
        };

        Puncturing::new(vec![Segment::new(l1, pi1), Segment::new(l2, pi2)])
    }
}
