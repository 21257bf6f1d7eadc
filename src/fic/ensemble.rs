//! Ensemble configuration assembled from the FIGs of valid FIBs.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

#[cfg(feature = "ser")]
use serde::{Deserialize, Serialize};

use crate::fic::fig::Fig;
use crate::msc::protection::EepParams;

/// Audio service component type of DAB+ audio.
pub const ASCTY_DAB_PLUS: u8 = 63;

/// Equal error protection profile set.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "ser", derive(Serialize, Deserialize))]
pub enum EepProfile {
    /// Sizes in multiples of 8 kbit/s.
    A,
    /// Sizes in multiples of 32 kbit/s.
    B,
}

/// Protection of a sub-channel.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "ser", derive(Serialize, Deserialize))]
pub enum Protection {
    /// Equal error protection at level 1 (strongest) through 4.
    Eep { profile: EepProfile, level: u8 },
    /// Unequal error protection given by its table index.
    Uep { index: u8 },
}

/// Sub-channel of the MSC.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "ser", derive(Serialize, Deserialize))]
pub struct SubChannel {
    pub id: u8,
    /// Start address in capacity units.
    pub start: u16,
    /// Size in capacity units, if known.
    pub size: Option<u16>,
    pub protection: Protection,
}

impl SubChannel {
    /// Equal error protection parameters, if the sub-channel uses it.
    pub fn eep(&self) -> Option<EepParams> {
        match (self.protection, self.size) {
            (Protection::Eep { profile, level }, Some(size)) =>
                EepParams::new(profile, level, size),
            _ => None,
        }
    }

    /// Bitrate in kbit/s, if known.
    pub fn bitrate(&self) -> Option<u32> { self.eep().map(|p| p.bitrate()) }
}

/// Content of a service component.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "ser", derive(Serialize, Deserialize))]
pub enum ComponentKind {
    /// Stream mode audio of the given ASCTy.
    Audio(u8),
    /// Stream mode data of the given DSCTy.
    Data(u8),
    /// Packet mode data with the given service component identifier.
    Packet(u16),
    Reserved,
}

/// Component of a service.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "ser", derive(Serialize, Deserialize))]
pub struct Component {
    pub kind: ComponentKind,
    /// Sub-channel carrying a stream mode component.
    pub subchannel: Option<u8>,
    /// Whether this is the primary component of the service.
    pub primary: bool,
    /// Whether conditional access applies.
    pub ca: bool,
}

impl Component {
    pub fn is_dab_plus(&self) -> bool {
        self.kind == ComponentKind::Audio(ASCTY_DAB_PLUS)
    }
}

/// Text label with its short form.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "ser", derive(Serialize, Deserialize))]
pub struct Label {
    pub text: String,
    pub short: String,
}

/// UTC date and time.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "ser", derive(Serialize, Deserialize))]
pub struct DateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub millis: u16,
}

/// Programme or data service.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "ser", derive(Serialize, Deserialize))]
pub struct Service {
    /// Service identifier, 16 bits for programme and 32 bits for data services.
    pub id: u32,
    pub label: Option<Label>,
    pub components: Vec<Component>,
}

impl Service {
    /// The primary component, or the first one if none is flagged.
    pub fn primary(&self) -> Option<&Component> {
        self.components.iter().find(|c| c.primary).or_else(|| self.components.first())
    }
}

/// Snapshot of an ensemble's configuration.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "ser", derive(Serialize, Deserialize))]
pub struct Ensemble {
    pub id: Option<u16>,
    pub label: Option<Label>,
    /// Extended country code.
    pub ecc: Option<u8>,
    /// Local time offset in half hours.
    pub lto: Option<i8>,
    /// Most recent broadcast time.
    pub time: Option<DateTime>,
    pub subchannels: BTreeMap<u8, SubChannel>,
    pub services: BTreeMap<u32, Service>,
}

impl Ensemble {
    /// Country code carried in the top nibble of the ensemble identifier.
    pub fn country(&self) -> Option<u8> { self.id.map(|id| (id >> 12) as u8) }

    pub fn services(&self) -> impl Iterator<Item = &Service> { self.services.values() }

    pub fn subchannel(&self, id: u8) -> Option<&SubChannel> { self.subchannels.get(&id) }

    /// Find the sub-channel carrying the primary audio of the given service.
    pub fn audio_service(&self, sid: u32) -> Option<&SubChannel> {
        let service = self.services.get(&sid)?;

        let comp = service.components.iter()
            .filter(|c| matches!(c.kind, ComponentKind::Audio(_)))
            .find(|c| c.primary)
            .or_else(|| {
                service.components.iter().find(|c| matches!(c.kind, ComponentKind::Audio(_)))
            })?;

        self.subchannels.get(&comp.subchannel?)
    }

    /// Find the service whose components include the given sub-channel.
    pub fn service_for(&self, subchannel: u8) -> Option<&Service> {
        self.services.values()
            .find(|s| s.components.iter().any(|c| c.subchannel == Some(subchannel)))
    }
}

/// Applies FIGs to a working ensemble and publishes snapshots of it.
pub struct EnsembleBuilder {
    cur: Ensemble,
    published: Arc<Ensemble>,
    /// Whether the working ensemble differs from the published one.
    dirty: bool,
    /// Whether the working ensemble differs in more than the time.
    changed: bool,
}

impl EnsembleBuilder {
    pub fn new() -> EnsembleBuilder {
        EnsembleBuilder {
            cur: Ensemble::default(),
            published: Arc::new(Ensemble::default()),
            dirty: false,
            changed: false,
        }
    }

    /// Forget the whole ensemble.
    pub fn reset(&mut self) {
        self.cur = Ensemble::default();
        self.published = Arc::new(Ensemble::default());
        self.dirty = false;
        self.changed = false;
    }

    /// Most recently published snapshot.
    pub fn ensemble(&self) -> Arc<Ensemble> { self.published.clone() }

    /// Working ensemble, including changes not yet published.
    pub fn current(&self) -> &Ensemble { &self.cur }

    /// Publish the working ensemble if it changed. Return the new snapshot and whether
    /// anything other than the time changed.
    pub fn publish(&mut self) -> Option<(Arc<Ensemble>, bool)> {
        if !self.dirty {
            return None;
        }

        let changed = self.changed;

        self.published = Arc::new(self.cur.clone());
        self.dirty = false;
        self.changed = false;

        Some((self.published.clone(), changed))
    }

    fn mark(&mut self, changed: bool) {
        self.dirty = true;
        self.changed |= changed;
    }

    /// Apply the given FIG to the working ensemble.
    pub fn apply(&mut self, fig: Fig) {
        match fig {
            Fig::EnsembleInfo { id, .. } => {
                if self.cur.id == Some(id) {
                    return;
                }

                if let Some(old) = self.cur.id {
                    info!("ensemble changed from {:04X} to {:04X}", old, id);
                    self.cur = Ensemble::default();
                } else {
                    info!("found ensemble {:04X}", id);
                }

                self.cur.id = Some(id);
                self.mark(true);
            },
            Fig::SubChannels(subs) => for sub in subs {
                // The first organization seen holds for the ensemble.
                if self.cur.subchannels.contains_key(&sub.id) {
                    continue;
                }

                debug!("sub-channel {}: {:?}", sub.id, sub);
                self.cur.subchannels.insert(sub.id, sub);
                self.mark(true);
            },
            Fig::Services(services) => for (sid, comps) in services {
                let service = self.cur.services.entry(sid).or_insert_with(|| Service {
                    id: sid,
                    label: None,
                    components: vec![],
                });

                let mut added = false;

                for comp in comps {
                    if !service.components.contains(&comp) {
                        service.components.push(comp);
                        added = true;
                    }
                }

                if added {
                    debug!("service {:X}: {:?}", sid, service.components);
                    self.mark(true);
                }
            },
            Fig::Country { lto, ecc, .. } => {
                if self.cur.lto != Some(lto) || self.cur.ecc != Some(ecc) {
                    self.cur.lto = Some(lto);
                    self.cur.ecc = Some(ecc);
                    self.mark(true);
                }
            },
            Fig::Time(t) => {
                if self.cur.time != Some(t) {
                    self.cur.time = Some(t);
                    self.mark(false);
                }
            },
            Fig::EnsembleLabel(id, label) => {
                if self.cur.id == Some(id) && self.cur.label.as_ref() != Some(&label) {
                    self.cur.label = Some(label);
                    self.mark(true);
                }
            },
            Fig::ServiceLabel(sid, label) => {
                let service = self.cur.services.entry(sid).or_insert_with(|| Service {
                    id: sid,
                    label: None,
                    components: vec![],
                });

                if service.label.as_ref() != Some(&label) {
                    service.label = Some(label);
                    self.mark(true);
                }
            },
            Fig::Other(..) => {},
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sub(id: u8, start: u16, size: u16, level: u8) -> SubChannel {
        SubChannel {
            id: id,
            start: start,
            size: Some(size),
            protection: Protection::Eep { profile: EepProfile::A, level: level },
        }
    }

    fn audio(sub: u8) -> Component {
        Component {
            kind: ComponentKind::Audio(ASCTY_DAB_PLUS),
            subchannel: Some(sub),
            primary: true,
            ca: false,
        }
    }

    fn figs() -> Vec<Fig> {
        vec![
            Fig::EnsembleInfo { id: 0x1001, change: 0, alarm: false, cif_count: 0 },
            Fig::SubChannels(vec![sub(1, 0, 36, 3), sub(2, 36, 48, 2)]),
            Fig::Services(vec![(0xC221, vec![audio(1)]), (0xC222, vec![audio(2)])]),
            Fig::ServiceLabel(0xC221, Label {
                text: "One".to_string(),
                short: "One".to_string(),
            }),
        ]
    }

    #[test]
    fn test_build() {
        let mut b = EnsembleBuilder::new();

        assert!(b.publish().is_none());

        for f in figs() {
            b.apply(f);
        }

        // Nothing is visible until published.
        assert_eq!(b.ensemble().id, None);

        let (e, changed) = b.publish().unwrap();
        assert!(changed);
        assert_eq!(e.id, Some(0x1001));
        assert_eq!(e.country(), Some(1));
        assert_eq!(e.subchannels.len(), 2);
        assert_eq!(e.services().count(), 2);
        assert_eq!(e.audio_service(0xC222).map(|s| s.id), Some(2));
        assert_eq!(e.service_for(1).and_then(|s| s.label.clone()).unwrap().text, "One");
        assert!(e.services[&0xC221].primary().unwrap().is_dab_plus());
        assert_eq!(e.subchannel(1).and_then(|s| s.bitrate()), Some(48));
        assert!(b.publish().is_none());
    }

    #[test]
    fn test_idempotent() {
        let mut once = EnsembleBuilder::new();
        let mut twice = EnsembleBuilder::new();

        for f in figs() {
            once.apply(f);
        }

        for f in figs().into_iter().chain(figs()) {
            twice.apply(f);
        }

        assert_eq!(once.current(), twice.current());
        assert_eq!(twice.current().services[&0xC221].components.len(), 1);
    }

    #[test]
    fn test_protection_fixed() {
        let mut b = EnsembleBuilder::new();

        for f in figs() {
            b.apply(f);
        }

        b.publish();
        b.apply(Fig::SubChannels(vec![sub(1, 12, 24, 1)]));

        assert!(b.publish().is_none());
        assert_eq!(b.current().subchannels[&1], sub(1, 0, 36, 3));
    }

    #[test]
    fn test_new_ensemble() {
        let mut b = EnsembleBuilder::new();

        for f in figs() {
            b.apply(f);
        }

        b.apply(Fig::EnsembleInfo { id: 0x2002, change: 0, alarm: false, cif_count: 0 });

        let (e, _) = b.publish().unwrap();
        assert_eq!(e.id, Some(0x2002));
        assert!(e.subchannels.is_empty());
        assert!(e.services.is_empty());
    }

    #[test]
    fn test_time_only() {
        let mut b = EnsembleBuilder::new();

        b.apply(Fig::Time(DateTime { year: 2020, ..DateTime::default() }));

        let (e, changed) = b.publish().unwrap();
        assert!(!changed);
        assert_eq!(e.time.map(|t| t.year), Some(2020));
    }
}
