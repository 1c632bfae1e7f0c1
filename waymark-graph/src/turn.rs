//! Turn geometry, weight and instruction classification (spec §4.4.4,
//! §4.4.5). Bearing/angle arithmetic reuses `waymark_common::geo`, which
//! already carries the teacher's `ebg::turn_penalty::TurnGeometry::compute`
//! wrap-to-`[-180,180]` logic; this module adds the U-turn threshold,
//! instruction buckets and weight formula on top. The per-angle cost itself
//! comes from the profile's `turn_function` rather than a baked-in sigmoid,
//! since that piece is spec'd as profile policy (§6).

/// Sentinel bearing meaning "no geometry available" (e.g. a degenerate
/// zero-length segment) — matches the teacher's NA-bearing convention.
pub const BEARING_NA: u16 = 65535;

/// Wrap `to_bearing - from_bearing` into `[-180, 180]` degrees. Both
/// bearings are deci-degrees in `0..3600`.
pub fn turn_angle_degrees(from_bearing_deci: u16, to_bearing_deci: u16) -> f64 {
    if from_bearing_deci == BEARING_NA || to_bearing_deci == BEARING_NA {
        return 0.0;
    }
    waymark_common::geo::turn_angle_degrees(from_bearing_deci, to_bearing_deci) as f64
}

/// Matches the teacher's `is_uturn` threshold: angles within 10 degrees of
/// a full reversal count as a U-turn rather than a sharp turn.
pub fn is_u_turn(angle_degrees: f64) -> bool {
    angle_degrees.abs() >= 170.0
}

/// Symbolic turn classification (spec §4.4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnInstruction {
    NoTurn,
    Straight,
    SlightLeft,
    SlightRight,
    Left,
    Right,
    SharpLeft,
    SharpRight,
    UTurn,
    EnterRoundabout,
    LeaveRoundabout,
    StayOnRoundabout,
}

/// Everything `classify_instruction` needs about the two edges meeting at
/// the turn's via node.
pub struct TurnContext {
    pub angle_degrees: f64,
    pub from_is_roundabout: bool,
    pub to_is_roundabout: bool,
    /// Out-degree of the via node among admissible turns, used to collapse
    /// roundabout continuations and same-name pass-throughs to `NoTurn`.
    pub via_out_degree: u32,
    pub same_name: bool,
}

/// Classify a turn per spec §4.4.5's bucket rules.
pub fn classify_instruction(ctx: &TurnContext) -> TurnInstruction {
    if ctx.from_is_roundabout && ctx.to_is_roundabout {
        return if ctx.via_out_degree == 1 {
            TurnInstruction::NoTurn
        } else {
            TurnInstruction::StayOnRoundabout
        };
    }
    if ctx.from_is_roundabout {
        return TurnInstruction::LeaveRoundabout;
    }
    if ctx.to_is_roundabout {
        return TurnInstruction::EnterRoundabout;
    }

    if ctx.same_name && ctx.via_out_degree <= 2 {
        return TurnInstruction::NoTurn;
    }

    if is_u_turn(ctx.angle_degrees) {
        return TurnInstruction::UTurn;
    }

    let angle = ctx.angle_degrees;
    if angle.abs() <= 5.0 {
        TurnInstruction::Straight
    } else if angle > 5.0 && angle <= 45.0 {
        TurnInstruction::SlightRight
    } else if angle > 45.0 && angle <= 135.0 {
        TurnInstruction::Right
    } else if angle > 135.0 {
        TurnInstruction::SharpRight
    } else if angle < -5.0 && angle >= -45.0 {
        TurnInstruction::SlightLeft
    } else if angle < -45.0 && angle >= -135.0 {
        TurnInstruction::Left
    } else {
        TurnInstruction::SharpLeft
    }
}

/// Components feeding the turn-weight formula (spec §4.4.4):
/// `segment_weight(u,v) + traffic_light_penalty·1[v is traffic light] +
/// u_turn_penalty·1[turn is U-turn] + profile_turn_penalty(angle)`.
pub struct TurnWeightInputs {
    pub segment_weight_ds: i32,
    pub via_is_traffic_light: bool,
    pub traffic_signal_penalty_ds: i32,
    pub u_turn_penalty_ds: i32,
    /// `profile.turn_function(angle_degrees)`, or 0 when the profile has no
    /// turn function (spec §6: absence means zero penalty for every turn).
    pub profile_turn_penalty_ds: i32,
    pub is_u_turn: bool,
}

pub fn turn_weight_ds(inputs: &TurnWeightInputs) -> i32 {
    let mut weight = inputs.segment_weight_ds;
    if inputs.via_is_traffic_light {
        weight += inputs.traffic_signal_penalty_ds;
    }
    if inputs.is_u_turn {
        weight += inputs.u_turn_penalty_ds;
    }
    weight += inputs.profile_turn_penalty_ds;
    weight
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_continuation_has_zero_angle() {
        assert_eq!(turn_angle_degrees(0, 0), 0.0);
    }

    #[test]
    fn ninety_degree_right_turn_wraps_to_positive_ninety() {
        assert_eq!(turn_angle_degrees(0, 900), 90.0);
    }

    #[test]
    fn two_seventy_bearing_wraps_to_negative_ninety() {
        assert_eq!(turn_angle_degrees(0, 2700), -90.0);
    }

    #[test]
    fn na_bearing_yields_zero_angle() {
        assert_eq!(turn_angle_degrees(BEARING_NA, 900), 0.0);
    }

    #[test]
    fn angle_near_180_is_a_u_turn() {
        assert!(is_u_turn(175.0));
        assert!(is_u_turn(-180.0));
        assert!(!is_u_turn(150.0));
    }

    #[test]
    fn both_roundabout_with_single_exit_is_no_turn() {
        let ctx = TurnContext {
            angle_degrees: 10.0,
            from_is_roundabout: true,
            to_is_roundabout: true,
            via_out_degree: 1,
            same_name: false,
        };
        assert_eq!(classify_instruction(&ctx), TurnInstruction::NoTurn);
    }

    #[test]
    fn both_roundabout_with_multiple_exits_stays_on_roundabout() {
        let ctx = TurnContext {
            angle_degrees: 30.0,
            from_is_roundabout: true,
            to_is_roundabout: true,
            via_out_degree: 3,
            same_name: false,
        };
        assert_eq!(classify_instruction(&ctx), TurnInstruction::StayOnRoundabout);
    }

    #[test]
    fn entering_and_leaving_roundabout_are_distinguished() {
        let entering = TurnContext {
            angle_degrees: 10.0,
            from_is_roundabout: false,
            to_is_roundabout: true,
            via_out_degree: 3,
            same_name: false,
        };
        assert_eq!(classify_instruction(&entering), TurnInstruction::EnterRoundabout);

        let leaving = TurnContext {
            angle_degrees: 10.0,
            from_is_roundabout: true,
            to_is_roundabout: false,
            via_out_degree: 3,
            same_name: false,
        };
        assert_eq!(classify_instruction(&leaving), TurnInstruction::LeaveRoundabout);
    }

    #[test]
    fn same_name_pass_through_at_simple_intersection_is_no_turn() {
        let ctx = TurnContext {
            angle_degrees: 20.0,
            from_is_roundabout: false,
            to_is_roundabout: false,
            via_out_degree: 2,
            same_name: true,
        };
        assert_eq!(classify_instruction(&ctx), TurnInstruction::NoTurn);
    }

    #[test]
    fn sharp_angle_is_classified_as_u_turn_before_bucket_by_angle() {
        let ctx = TurnContext {
            angle_degrees: 175.0,
            from_is_roundabout: false,
            to_is_roundabout: false,
            via_out_degree: 4,
            same_name: false,
        };
        assert_eq!(classify_instruction(&ctx), TurnInstruction::UTurn);
    }

    #[test]
    fn moderate_right_angle_buckets_to_right() {
        let ctx = TurnContext {
            angle_degrees: 80.0,
            from_is_roundabout: false,
            to_is_roundabout: false,
            via_out_degree: 4,
            same_name: false,
        };
        assert_eq!(classify_instruction(&ctx), TurnInstruction::Right);
    }

    #[test]
    fn turn_weight_sums_all_components() {
        let inputs = TurnWeightInputs {
            segment_weight_ds: 100,
            via_is_traffic_light: true,
            traffic_signal_penalty_ds: 80,
            u_turn_penalty_ds: 200,
            profile_turn_penalty_ds: 10,
            is_u_turn: true,
        };
        assert_eq!(turn_weight_ds(&inputs), 100 + 80 + 200 + 10);
    }

    #[test]
    fn turn_weight_skips_absent_penalties() {
        let inputs = TurnWeightInputs {
            segment_weight_ds: 50,
            via_is_traffic_light: false,
            traffic_signal_penalty_ds: 80,
            u_turn_penalty_ds: 200,
            profile_turn_penalty_ds: 5,
            is_u_turn: false,
        };
        assert_eq!(turn_weight_ds(&inputs), 55);
    }
}
