//! Property tests for the condition payload mappings.

use maple_peripherals::{
    ControllerCondition, GamepadButtons, GamepadState, HatDirection, MouseButtons, MouseCondition,
};
use proptest::prelude::*;

fn arb_gamepad() -> impl Strategy<Value = GamepadState> {
    (
        any::<u32>(),
        any::<u8>(),
        any::<[u8; 4]>(),
        any::<[u8; 2]>(),
    )
        .prop_map(|(buttons, hat, [lx, ly, rx, ry], [lt, rt])| GamepadState {
            buttons: GamepadButtons(buttons),
            hat: HatDirection::from_hid(hat),
            left_x: lx,
            left_y: ly,
            right_x: rx,
            right_y: ry,
            left_trigger: lt,
            right_trigger: rt,
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn prop_controller_buttons_are_active_low(state in arb_gamepad()) {
        let condition = ControllerCondition::from_gamepad(&state);
        let [word, sticks] = condition.to_words();
        prop_assert_eq!((word >> 16) as u16, !condition.pressed.0);
        prop_assert_eq!(word & 0xFF, u32::from(state.left_trigger));
        prop_assert_eq!((word >> 8) & 0xFF, u32::from(state.right_trigger));
        prop_assert_eq!(sticks.to_be_bytes(), [state.left_x, state.left_y, state.right_x, state.right_y]);
    }

    #[test]
    fn prop_second_dpad_never_pressed(state in arb_gamepad()) {
        let condition = ControllerCondition::from_gamepad(&state);
        prop_assert_eq!(condition.pressed.0 & 0x00F0, 0);
    }

    #[test]
    fn prop_mouse_axes_stay_in_ten_bits(dx in any::<i32>(), dy in any::<i32>(), wheel in any::<i32>(), buttons in 0u8..8) {
        let condition = MouseCondition::from_motion(MouseButtons(buttons), dx, dy, wheel);
        for axis in condition.axes {
            prop_assert!((0x001..=0x3FF).contains(&axis));
        }
        prop_assert_eq!(condition.button_word() & !0x0E, 0xF1);
    }
}
