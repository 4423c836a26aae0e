//! Property tests for completion matching

use proptest::prelude::*;

use wmsync::{
    display::{DisplayEvent, WindowId},
    sync::{classify, SyncRequest, SyncToken, Verdict},
};

proptest! {
    /// Only the exact `[window, token]` pair on the barrier window resolves
    #[test]
    fn prop_resolves_only_on_exact_payload(
        window in 1u32..,
        token in any::<u32>(),
        target in 1u32..,
        payload in any::<[u32; 2]>(),
    ) {
        let expected = SyncRequest::new(WindowId(window), SyncToken::new(token));
        let event = DisplayEvent::SyncNotify { window: WindowId(target), payload };

        let verdict = classify(&event, &expected);
        let exact = target == window && payload == [window, token];
        prop_assert_eq!(verdict == Verdict::Resolved, exact);

        if target != window {
            prop_assert_eq!(verdict, Verdict::ForeignWindow);
        } else if !exact {
            prop_assert_eq!(verdict, Verdict::Mismatch { got: payload });
        }
    }

    /// Client messages of other types are never completions
    #[test]
    fn prop_other_client_messages_are_noise(window in any::<u32>(), message_type in any::<u32>()) {
        let expected = SyncRequest::new(WindowId(window), SyncToken::new(1));
        let event = DisplayEvent::ClientMessage { window: WindowId(window), message_type };
        prop_assert_eq!(classify(&event, &expected), Verdict::Noise);
    }
}
