//! Satellite placement and ISL mesh wiring.

use constellation_net::{ChannelParams, Endpoint, Mobility, Network, NodeId, NodeKind};
use orbit_mobility::{CircularOrbitModel, OrbitalParameters};
use sim_engine::SimTime;
use std::net::Ipv4Addr;
use tracing::info;

use crate::{Result, TopologyError, WalkerLayout};

/// The four inter-satellite directions, in interface order: eth0 points at
/// the next satellite in the plane, eth1 at the next plane, eth2 and eth3
/// at the previous ones. A link arriving from one direction lands on the
/// opposite interface of the neighbor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IslDirection {
    Up = 0,
    Right = 1,
    Down = 2,
    Left = 3,
}

impl IslDirection {
    pub const ALL: [IslDirection; 4] = [
        IslDirection::Up,
        IslDirection::Right,
        IslDirection::Down,
        IslDirection::Left,
    ];

    pub fn ifindex(self) -> u32 {
        self as u32
    }

    pub fn opposite(self) -> IslDirection {
        match self {
            IslDirection::Up => IslDirection::Down,
            IslDirection::Right => IslDirection::Left,
            IslDirection::Down => IslDirection::Up,
            IslDirection::Left => IslDirection::Right,
        }
    }

    /// Grid cell of the neighbor in this direction.
    pub fn step(self, plane: i64, slot: i64) -> (i64, i64) {
        match self {
            IslDirection::Up => (plane, slot + 1),
            IslDirection::Right => (plane + 1, slot),
            IslDirection::Down => (plane, slot - 1),
            IslDirection::Left => (plane - 1, slot),
        }
    }
}

/// Create every satellite of the layout, in grid order (plane-major), and
/// return their node ids. Each satellite gets four ISL interfaces eth0..eth3
/// and a ground-facing eth4 with a /24 of its own.
pub fn place_satellites(net: &mut Network, layout: &WalkerLayout) -> Result<Vec<NodeId>> {
    layout.validate()?;

    let mut sats = Vec::with_capacity(layout.satellite_count());
    for plane in 0..layout.planes {
        for slot in 0..layout.sats_per_plane {
            let model = CircularOrbitModel::new(OrbitalParameters {
                initial_phase_rad: layout.initial_phase_rad(plane, slot),
                inclination_rad: layout.inclination_deg.to_radians(),
                altitude_km: layout.altitude_km,
                raan_rad: layout.raan_rad(plane),
                earth_rotation_rad_s: layout.earth_rotation_rad_s,
            })?;

            let id = net.add_node(
                format!("sat[{plane}][{slot}]"),
                NodeKind::Satellite,
                Mobility::Orbital(model),
            );

            let ordinal = sats.len() as u32;
            let hi = (ordinal >> 8) as u8;
            let lo = (ordinal & 0xff) as u8;
            for direction in IslDirection::ALL {
                let k = direction.ifindex() as u8;
                net.add_interface(
                    id,
                    &format!("eth{k}"),
                    Ipv4Addr::new(172, 16 + k, hi, lo),
                    Ipv4Addr::new(255, 255, 255, 255),
                )?;
            }
            net.add_interface(
                id,
                "eth4",
                Ipv4Addr::new(10, hi, lo, 1),
                Ipv4Addr::new(255, 255, 255, 0),
            )?;
            sats.push(id);
        }
    }
    info!(
        satellites = sats.len(),
        planes = layout.planes,
        per_plane = layout.sats_per_plane,
        "constellation placed"
    );
    Ok(sats)
}

/// Wire the static toroidal ISL mesh: one directed link out of each ISL
/// interface of each satellite, landing on the opposite interface of the
/// wrapped grid neighbor. Returns the number of directed edges created.
pub fn build_isl_mesh(
    net: &mut Network,
    layout: &WalkerLayout,
    sats: &[NodeId],
    channel: ChannelParams,
    now: SimTime,
) -> Result<usize> {
    layout.validate()?;
    if sats.len() != layout.satellite_count() {
        return Err(TopologyError::GridMismatch {
            expected: layout.satellite_count(),
            actual: sats.len(),
        });
    }

    let mut edges = 0usize;
    for plane in 0..layout.planes as i64 {
        for slot in 0..layout.sats_per_plane as i64 {
            let src = sats[layout.grid_index(plane, slot)];
            for direction in IslDirection::ALL {
                let (np, ns) = direction.step(plane, slot);
                let dst = sats[layout.grid_index(np, ns)];
                net.connect(
                    Endpoint::new(src, direction.ifindex()),
                    Endpoint::new(dst, direction.opposite().ifindex()),
                    channel,
                    now,
                )?;
                edges += 1;
            }
        }
    }
    info!(edges, "ISL mesh wired");
    Ok(edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn layout(planes: u32, per_plane: u32, phasing: u32) -> WalkerLayout {
        WalkerLayout {
            planes,
            sats_per_plane: per_plane,
            phasing_factor: phasing,
            inclination_deg: 53.0,
            altitude_km: 600.0,
            raan_offset_deg: 0.0,
            phase_offset_deg: 0.0,
            earth_rotation_rad_s: 0.0,
        }
    }

    fn build(planes: u32, per_plane: u32) -> (Network, Vec<NodeId>, WalkerLayout) {
        let layout = layout(planes, per_plane, 1);
        let mut net = Network::new();
        let sats = place_satellites(&mut net, &layout).unwrap();
        build_isl_mesh(&mut net, &layout, &sats, ChannelParams::default(), SimTime::ZERO)
            .unwrap();
        (net, sats, layout)
    }

    #[test]
    fn four_by_four_grid_yields_sixty_four_directed_edges() {
        let (net, sats, _) = build(4, 4);
        assert_eq!(net.link_count(), 64);

        for &sat in &sats {
            for k in 0..4 {
                assert!(net.link_from(Endpoint::new(sat, k)).is_some());
            }
            // The ground slot stays free for terminals.
            assert!(net.link_from(Endpoint::new(sat, crate::GROUND_IFINDEX)).is_none());
        }
    }

    #[test]
    fn edges_wrap_around_both_axes() {
        let (net, sats, layout) = build(4, 4);

        // Down from slot 0 wraps to slot 3 of the same plane.
        let down = net.link_from(Endpoint::new(sats[0], IslDirection::Down.ifindex())).unwrap();
        let down = net.link(down).unwrap();
        assert_eq!(down.dst().node, sats[layout.grid_index(0, -1)]);
        assert_eq!(down.dst().ifindex, IslDirection::Up.ifindex());

        // Left from plane 0 wraps to plane 3.
        let left = net.link_from(Endpoint::new(sats[0], IslDirection::Left.ifindex())).unwrap();
        let left = net.link(left).unwrap();
        assert_eq!(left.dst().node, sats[layout.grid_index(-1, 0)]);
        assert_eq!(left.dst().ifindex, IslDirection::Right.ifindex());
    }

    #[test]
    fn mesh_rejects_wrong_satellite_list() {
        let layout = layout(4, 4, 1);
        let mut net = Network::new();
        let mut sats = place_satellites(&mut net, &layout).unwrap();
        sats.pop();
        let err =
            build_isl_mesh(&mut net, &layout, &sats, ChannelParams::default(), SimTime::ZERO)
                .unwrap_err();
        assert_eq!(
            err,
            TopologyError::GridMismatch {
                expected: 16,
                actual: 15
            }
        );
    }

    #[test]
    fn two_plane_grid_reaches_the_same_plane_both_ways() {
        // With two planes, Right and Left point at the same neighbor plane
        // but stay distinct links on distinct interfaces.
        let (net, sats, _) = build(2, 3);
        let right = net
            .link(net.link_from(Endpoint::new(sats[0], 1)).unwrap())
            .unwrap()
            .dst();
        let left = net
            .link(net.link_from(Endpoint::new(sats[0], 3)).unwrap())
            .unwrap()
            .dst();
        assert_eq!(right.node, left.node);
        assert_ne!(right.ifindex, left.ifindex);
    }

    proptest! {
        #[test]
        fn mesh_invariants_hold_for_any_grid(
            planes in 2u32..9,
            per_plane in 2u32..9,
            phasing in 0u32..9,
        ) {
            prop_assume!(phasing < planes);
            let layout = layout(planes, per_plane, phasing);
            let mut net = Network::new();
            let sats = place_satellites(&mut net, &layout).unwrap();
            let edges =
                build_isl_mesh(&mut net, &layout, &sats, ChannelParams::default(), SimTime::ZERO)
                    .unwrap();

            // 4 * N * M directed edges, none of them self-loops, and every
            // edge lands on the interface opposite its origin.
            prop_assert_eq!(edges, 4 * (planes * per_plane) as usize);
            prop_assert_eq!(net.link_count(), edges);
            for link in net.links().iter() {
                prop_assert_ne!(link.src().node, link.dst().node);
                let out = link.src().ifindex;
                let inn = link.dst().ifindex;
                prop_assert_eq!([2u32, 3, 0, 1][out as usize], inn);
            }

            // Up then Down comes back home, for every satellite.
            let dst_of = |net: &Network, src: Endpoint| {
                net.link(net.link_from(src).unwrap()).unwrap().dst().node
            };
            for &sat in &sats {
                let up = dst_of(&net, Endpoint::new(sat, IslDirection::Up.ifindex()));
                let back = dst_of(&net, Endpoint::new(up, IslDirection::Down.ifindex()));
                prop_assert_eq!(back, sat);
            }
        }

        #[test]
        fn every_satellite_is_exactly_four_regular(
            planes in 2u32..9,
            per_plane in 2u32..9,
        ) {
            let layout = layout(planes, per_plane, 1);
            let mut net = Network::new();
            let sats = place_satellites(&mut net, &layout).unwrap();
            build_isl_mesh(&mut net, &layout, &sats, ChannelParams::default(), SimTime::ZERO)
                .unwrap();

            for &sat in &sats {
                let outgoing = net.links().iter().filter(|l| l.src().node == sat).count();
                let incoming = net.links().iter().filter(|l| l.dst().node == sat).count();
                prop_assert_eq!(outgoing, 4);
                prop_assert_eq!(incoming, 4);
            }
        }
    }
}
