//! Virtual controller state inferred from gesture scores.

use leap_hand_common::config::FeatureFlags;
use leap_hand_common::events::{ButtonEventKind, ButtonId, ButtonMask, ControllerAxis};

use crate::gesture::{GestureName, GestureScores};

pub const AXIS_TOUCHPAD: u32 = 0;
pub const AXIS_TRIGGER: u32 = 1;

/// Touch and press thresholds turning one gesture score into one button.
#[derive(Clone, Copy, Debug)]
struct ButtonRule {
    button: ButtonId,
    gesture: GestureName,
    touch: f32,
    press: f32,
}

const SYSTEM: ButtonRule = ButtonRule {
    button: ButtonId::System,
    gesture: GestureName::Timeout,
    touch: 0.25,
    press: 0.5,
};

const APPLICATION_MENU: ButtonRule = ButtonRule {
    button: ButtonId::ApplicationMenu,
    gesture: GestureName::FlatHandPalmTowards,
    touch: 0.4,
    press: 0.8,
};

const TRIGGER: ButtonRule = ButtonRule {
    button: ButtonId::Trigger,
    gesture: GestureName::TriggerFinger,
    touch: 0.25,
    press: 0.5,
};

const GRIP: ButtonRule = ButtonRule {
    button: ButtonId::Grip,
    gesture: GestureName::LowerFist,
    touch: 0.25,
    press: 0.5,
};

const TOUCHPAD: ButtonRule = ButtonRule {
    button: ButtonId::Touchpad,
    gesture: GestureName::Thumbpress,
    touch: 0.5,
    press: 0.9,
};

impl ButtonRule {
    fn apply(&self, scores: &GestureScores, press_enabled: bool, state: &mut ControllerState) {
        let score = scores[self.gesture];
        if score >= self.touch {
            state.buttons_touched.insert(self.button.mask());
            if press_enabled && score >= self.press {
                state.buttons_pressed.insert(self.button.mask());
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ControllerState {
    pub packet_number: u32,
    pub buttons_pressed: ButtonMask,
    pub buttons_touched: ButtonMask,
    /// Axis 0 is the pad, axis 1 the trigger (y always 0).
    pub axes: [ControllerAxis; 2],
}

impl ControllerState {
    /// The state following `self` for a frame in which the hand was matched.
    ///
    /// Built from zero, so a disabled feature clears whatever it last reported.
    pub fn next(&self, scores: &GestureScores, features: &FeatureFlags) -> ControllerState {
        let mut next = ControllerState {
            packet_number: self.packet_number.wrapping_add(1),
            ..Default::default()
        };

        if features.menu {
            SYSTEM.apply(scores, true, &mut next);
        }
        if features.application_menu {
            APPLICATION_MENU.apply(scores, true, &mut next);
        }
        if features.trigger {
            TRIGGER.apply(scores, true, &mut next);
        }
        if features.grip {
            GRIP.apply(scores, true, &mut next);
        }
        if features.touchpad && features.touchpad_touch {
            TOUCHPAD.apply(scores, features.touchpad_press, &mut next);
        }

        next.buttons_touched |= next.buttons_pressed;

        if features.touchpad_axes_reported() {
            next.axes[AXIS_TOUCHPAD as usize] = ControllerAxis::new(
                scores[GestureName::TouchpadAxisX],
                scores[GestureName::TouchpadAxisY],
            );
        }
        next.axes[AXIS_TRIGGER as usize] =
            ControllerAxis::new(scores[GestureName::TriggerFinger], 0.0);

        next
    }

    /// Button events taking `self` to `next`: every newly touched button, then
    /// newly pressed, then newly unpressed, then newly untouched. Within each
    /// group buttons come in ascending id order.
    pub fn button_transitions(
        &self,
        next: &ControllerState,
    ) -> impl Iterator<Item = (ButtonId, ButtonEventKind)> {
        let changed_touched = next.buttons_touched ^ self.buttons_touched;
        let changed_pressed = next.buttons_pressed ^ self.buttons_pressed;

        let groups = [
            (
                changed_touched & next.buttons_touched,
                ButtonEventKind::Touched,
            ),
            (
                changed_pressed & next.buttons_pressed,
                ButtonEventKind::Pressed,
            ),
            (
                changed_pressed & !next.buttons_pressed,
                ButtonEventKind::Unpressed,
            ),
            (
                changed_touched & !next.buttons_touched,
                ButtonEventKind::Untouched,
            ),
        ];

        groups
            .into_iter()
            .flat_map(|(mask, kind)| mask.buttons().map(move |button| (button, kind)))
    }

    /// Axes whose value differs between `self` and `next` and that the host should hear about.
    pub fn axis_changes(
        &self,
        next: &ControllerState,
        features: &FeatureFlags,
    ) -> Vec<(u32, ControllerAxis)> {
        let mut changes = Vec::with_capacity(2);
        let pad = AXIS_TOUCHPAD as usize;
        if features.touchpad_axes_reported() && next.axes[pad] != self.axes[pad] {
            changes.push((AXIS_TOUCHPAD, next.axes[pad]));
        }
        let trigger = AXIS_TRIGGER as usize;
        if next.axes[trigger].x != self.axes[trigger].x {
            changes.push((AXIS_TRIGGER, next.axes[trigger]));
        }
        changes
    }
}
