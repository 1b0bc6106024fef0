use cfg_aliases::cfg_aliases;

fn main() {
    // Alias for "any of the dedicated single-format decoders is enabled".
    // These share the integer sample conversion and the block cursor helpers,
    // and this saves copy/pasting the cfg check each time.
    cfg_aliases! {
        alt_decoders: {
            any(
                feature = "hound",
                feature = "claxon",
                feature = "lewton",
                feature = "minimp3"
            )
        },
        block_decoders: {
            any(
                feature = "claxon",
                feature = "lewton",
                feature = "minimp3",
                feature = "symphonia"
            )
        }
    }
}
