//! Cue index.
//!
//! Cluster positions are relative to the start of the Segment payload.

use crate::elements::*;
use crate::tree::Node;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CueTrackPosition {
    pub track: u64,
    pub cluster_position: u64,
    /// Offset of the block inside the cluster payload.
    pub relative_position: Option<u64>,
    /// Ticks.
    pub duration: Option<u64>,
    pub block_number: Option<u64>,
}

impl CueTrackPosition {
    pub fn new(track: u64, cluster_position: u64) -> Self {
        Self {
            track,
            cluster_position,
            relative_position: None,
            duration: None,
            block_number: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CuePoint {
    /// Ticks.
    pub time: u64,
    pub positions: Vec<CueTrackPosition>,
}

impl CuePoint {
    fn from_node(node: &Node) -> Self {
        Self {
            time: node.child_uint(CUE_TIME).unwrap_or(0),
            positions: node
                .children_with(CUE_TRACK_POSITIONS)
                .map(|p| CueTrackPosition {
                    track: p.child_uint(CUE_TRACK).unwrap_or(0),
                    cluster_position: p.child_uint(CUE_CLUSTER_POSITION).unwrap_or(0),
                    relative_position: p.child_uint(CUE_RELATIVE_POSITION),
                    duration: p.child_uint(CUE_DURATION),
                    block_number: p.child_uint(CUE_BLOCK_NUMBER),
                })
                .collect(),
        }
    }

    fn to_node(&self) -> Node {
        let mut node = Node::new_master(CUE_POINT);
        node.push(Node::uint(CUE_TIME, self.time));
        for position in &self.positions {
            let mut pos = Node::new_master(CUE_TRACK_POSITIONS);
            pos.push(Node::uint(CUE_TRACK, position.track));
            pos.push(Node::uint(CUE_CLUSTER_POSITION, position.cluster_position));
            if let Some(relative) = position.relative_position {
                pos.push(Node::uint(CUE_RELATIVE_POSITION, relative));
            }
            if let Some(duration) = position.duration {
                pos.push(Node::uint(CUE_DURATION, duration));
            }
            if let Some(block) = position.block_number {
                pos.push(Node::uint(CUE_BLOCK_NUMBER, block));
            }
            node.push(pos);
        }
        node
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Cues {
    pub points: Vec<CuePoint>,
}

impl Cues {
    pub fn from_node(node: &Node) -> Self {
        Self {
            points: node.children_with(CUE_POINT).map(CuePoint::from_node).collect(),
        }
    }

    pub fn to_node(&self) -> Node {
        Node::master(CUES, self.points.iter().map(CuePoint::to_node).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Add a position, sharing the cue point of an equal time.
    pub fn add(&mut self, time: u64, position: CueTrackPosition) {
        match self.points.iter_mut().rev().find(|p| p.time == time) {
            Some(point) => point.positions.push(position),
            None => self.points.push(CuePoint {
                time,
                positions: vec![position],
            }),
        }
    }

    /// Sort points by time (stable).
    pub fn sort(&mut self) {
        self.points.sort_by_key(|p| p.time);
    }

    /// Number of positions recorded for a track.
    pub fn count_for_track(&self, track: u64) -> usize {
        self.points
            .iter()
            .flat_map(|p| &p.positions)
            .filter(|p| p.track == track)
            .count()
    }

    /// The last cue of `track` at or before `time`, or the first one.
    pub fn find(&self, track: u64, time: u64) -> Option<(u64, &CueTrackPosition)> {
        let candidates = self.points.iter().flat_map(|point| {
            point
                .positions
                .iter()
                .filter(move |p| p.track == track)
                .map(move |p| (point.time, p))
        });
        candidates
            .clone()
            .filter(|(t, _)| *t <= time)
            .max_by_key(|(t, _)| *t)
            .or_else(|| candidates.min_by_key(|(t, _)| *t))
    }

    /// Add `delta` to every cluster position at or beyond `from`.
    pub fn relocate(&mut self, from: u64, delta: i64) {
        for position in self.points.iter_mut().flat_map(|p| &mut p.positions) {
            if position.cluster_position >= from {
                position.cluster_position = (position.cluster_position as i64 + delta) as u64;
            }
        }
    }
}
