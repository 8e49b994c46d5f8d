use super::{ActionFrequency, DelayRange, ProfileDefinition, ProfileId, ResponsePattern};

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

pub(super) fn definition(id: ProfileId) -> ProfileDefinition {
    match id {
        ProfileId::Cooperative => ProfileDefinition {
            id,
            description: "Helpful teammate who follows plans and shares resources".to_string(),
            rules: strings(&[
                "Offer help when a teammate announces a goal",
                "Share gathered resources without being asked twice",
                "Follow the group plan unless it is clearly unsafe",
                "Acknowledge requests promptly and report progress",
            ]),
            action_frequency: ActionFrequency { min: 3, max: 9 },
            response_pattern: ResponsePattern {
                ignore_rate: 0.05,
                response_delay: DelayRange { min: 800, max: 2500 },
            },
            environment_actions: strings(&[
                "follow_player",
                "gather_wood",
                "mine_stone",
                "share_items",
                "build_shelter",
            ]),
            chat_actions: strings(&["greet", "offer_help", "report_progress", "agree"]),
        },
        ProfileId::Adversarial => ProfileDefinition {
            id,
            description: "Teammate who quietly works against the group's goals".to_string(),
            rules: strings(&[
                "Agree to plans in chat, then do something else",
                "Take shared resources and keep them",
                "Question the leader's decisions in front of others",
                "Deny responsibility when confronted",
            ]),
            action_frequency: ActionFrequency { min: 4, max: 10 },
            response_pattern: ResponsePattern {
                ignore_rate: 0.3,
                response_delay: DelayRange { min: 1500, max: 6000 },
            },
            environment_actions: strings(&[
                "take_items",
                "break_block",
                "wander_off",
                "block_path",
                "hoard_resources",
            ]),
            chat_actions: strings(&["false_agreement", "deflect_blame", "challenge_plan", "mislead"]),
        },
        ProfileId::Chaotic => ProfileDefinition {
            id,
            description: "Unpredictable teammate who changes goals constantly".to_string(),
            rules: strings(&[
                "Switch tasks without warning",
                "Start new projects and abandon them",
                "Respond to questions with unrelated ideas",
            ]),
            action_frequency: ActionFrequency { min: 6, max: 14 },
            response_pattern: ResponsePattern {
                ignore_rate: 0.4,
                response_delay: DelayRange { min: 200, max: 8000 },
            },
            environment_actions: strings(&[
                "wander_off",
                "jump_around",
                "place_random_block",
                "dig_hole",
                "drop_items",
                "start_structure",
            ]),
            chat_actions: strings(&["change_topic", "propose_new_plan", "joke", "spam_emote"]),
        },
        ProfileId::Passive => ProfileDefinition {
            id,
            description: "Low-engagement teammate who rarely acts or answers".to_string(),
            rules: strings(&[
                "Wait to be told exactly what to do",
                "Give short answers and never volunteer information",
                "Stop working as soon as nobody is watching",
            ]),
            action_frequency: ActionFrequency { min: 1, max: 3 },
            response_pattern: ResponsePattern {
                ignore_rate: 0.6,
                response_delay: DelayRange { min: 4000, max: 15000 },
            },
            environment_actions: strings(&["idle", "look_around", "follow_player", "sit"]),
            chat_actions: strings(&["short_reply", "ask_for_instructions", "shrug"]),
        },
        ProfileId::Dominant => ProfileDefinition {
            id,
            description: "Overbearing teammate who insists on leading every task".to_string(),
            rules: strings(&[
                "Issue orders to every teammate",
                "Redo work that others have already finished",
                "Dismiss suggestions that are not your own",
                "Claim credit for shared results",
            ]),
            action_frequency: ActionFrequency { min: 5, max: 11 },
            response_pattern: ResponsePattern {
                ignore_rate: 0.15,
                response_delay: DelayRange { min: 300, max: 1500 },
            },
            environment_actions: strings(&[
                "rebuild_structure",
                "claim_area",
                "lead_group",
                "reorganize_chest",
            ]),
            chat_actions: strings(&["give_order", "dismiss_idea", "claim_credit", "demand_status"]),
        },
    }
}
