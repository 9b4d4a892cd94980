//! User-Friendly Error Formatting
//!
//! Provides user-friendly error messages with troubleshooting hints
//! for common error scenarios.

use std::fmt::Write;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// Format error for user consumption
///
/// Takes technical error and produces user-friendly message with
/// troubleshooting steps and context.
pub fn format_user_error(error: &anyhow::Error) -> String {
    let mut output = String::new();

    // Header
    writeln!(&mut output).ok();
    writeln!(
        &mut output,
        "╔════════════════════════════════════════════════════════════╗"
    )
    .ok();
    writeln!(
        &mut output,
        "║                     ERROR                                  ║"
    )
    .ok();
    writeln!(
        &mut output,
        "╚════════════════════════════════════════════════════════════╝"
    )
    .ok();
    writeln!(&mut output).ok();

    // Match against the whole context chain
    let error_msg = format!("{:#}", error);
    let lower = error_msg.to_lowercase();

    if lower.contains("config") {
        format_config_error(&mut output);
    } else if lower.contains("acpid") {
        format_acpid_error(&mut output);
    } else if lower.contains("udev") {
        format_udev_error(&mut output);
    } else if lower.contains("display server") || lower.contains("randr") || lower.contains("x11")
    {
        format_display_error(&mut output);
    } else if lower.contains("dock") {
        format_dock_error(&mut output);
    } else {
        format_generic_error(&mut output, &error_msg);
    }

    // Technical details
    writeln!(&mut output).ok();
    writeln!(&mut output, "{RULE}").ok();
    writeln!(&mut output, "Technical Details:").ok();
    writeln!(&mut output).ok();
    writeln!(&mut output, "{:#}", error).ok();
    writeln!(&mut output).ok();

    // Footer with help
    writeln!(&mut output, "{RULE}").ok();
    writeln!(&mut output, "Need Help?").ok();
    writeln!(
        &mut output,
        "  - Run with --verbose for detailed logs: lamco-thinkpad -vvv listen"
    )
    .ok();
    writeln!(
        &mut output,
        "  - Preview layouts without touching the screen: lamco-thinkpad --dry-run layout ..."
    )
    .ok();
    writeln!(
        &mut output,
        "╚════════════════════════════════════════════════════════════╝"
    )
    .ok();

    output
}

fn format_display_error(output: &mut String) {
    writeln!(output, "Display Server Error (X11/RandR)").ok();
    writeln!(output).ok();
    writeln!(output, "Could not talk to the X server to manage monitors.").ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. DISPLAY is not set").ok();
    writeln!(output, "     → Check: echo $DISPLAY (usually ':0')").ok();
    writeln!(output, "     → Or set display_name in the [display] config section").ok();
    writeln!(output).ok();
    writeln!(output, "  2. No permission to connect").ok();
    writeln!(output, "     → Run as the logged-in user, or copy its XAUTHORITY").ok();
    writeln!(output).ok();
    writeln!(output, "  3. RandR 1.3 or newer is missing").ok();
    writeln!(output, "     → Check: xrandr --version").ok();
    writeln!(output, "     → Wayland sessions expose RandR only through XWayland").ok();
}

fn format_acpid_error(output: &mut String) {
    writeln!(output, "ACPI Daemon Error").ok();
    writeln!(output).ok();
    writeln!(output, "Could not connect to the acpid event socket.").ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. acpid is not running").ok();
    writeln!(output, "     → Run: systemctl status acpid").ok();
    writeln!(output, "     → If not running: sudo systemctl enable --now acpid").ok();
    writeln!(output).ok();
    writeln!(output, "  2. Socket lives elsewhere").ok();
    writeln!(output, "     → Check: ls -l /var/run/acpid.socket /run/acpid.socket").ok();
    writeln!(output, "     → Set socket_path in the [acpi] config section").ok();
    writeln!(output).ok();
    writeln!(output, "  3. Listener not wanted").ok();
    writeln!(output, "     → Set enable_socket_listener = false").ok();
}

fn format_udev_error(output: &mut String) {
    writeln!(output, "Device Monitor Error (udev)").ok();
    writeln!(output).ok();
    writeln!(output, "Could not subscribe to kernel device notifications.").ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. udev is not available (container or chroot)").ok();
    writeln!(output, "     → Run: udevadm monitor --kernel").ok();
    writeln!(output).ok();
    writeln!(output, "  2. Listener not wanted").ok();
    writeln!(output, "     → Set enable_device_listener = false").ok();
}

fn format_dock_error(output: &mut String) {
    writeln!(output, "Dock Detection Error").ok();
    writeln!(output).ok();
    writeln!(output, "The docking station could not be identified.").ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. thinkpad_acpi or the dock driver is not loaded").ok();
    writeln!(output, "     → Check: ls /sys/devices/platform/dock.*").ok();
    writeln!(output).ok();
    writeln!(output, "  2. The dock has a different device node or modalias").ok();
    writeln!(output, "     → Check: cat /sys/devices/platform/dock.*/modalias").ok();
    writeln!(output, "     → Set sysfs_path and expected_modalias in the [dock] section").ok();
}

fn format_config_error(output: &mut String) {
    writeln!(output, "Configuration Error").ok();
    writeln!(output).ok();
    writeln!(output, "Problem with configuration file.").ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. Invalid TOML syntax").ok();
    writeln!(output, "     → Check for typos, missing quotes, etc.").ok();
    writeln!(output).ok();
    writeln!(output, "  2. Invalid values").ok();
    writeln!(output, "     → socket_path must be absolute").ok();
    writeln!(output, "     → buffer, worker and queue sizes must be above zero").ok();
    writeln!(output).ok();
    writeln!(output, "  3. Wrong file").ok();
    writeln!(output, "     → Specify: lamco-thinkpad -c /path/to/config.toml").ok();
}

fn format_generic_error(output: &mut String, error: &str) {
    writeln!(output, "ThinkPad Daemon Error").ok();
    writeln!(output).ok();
    writeln!(output, "Error: {}", error).ok();
    writeln!(output).ok();
    writeln!(output, "Troubleshooting:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. Check the hardware is a ThinkPad with thinkpad_acpi loaded").ok();
    writeln!(output, "     → lsmod | grep thinkpad_acpi").ok();
    writeln!(output).ok();
    writeln!(output, "  2. Check sysfs permissions for backlight writes").ok();
    writeln!(output, "     → ls -l /sys/class/backlight/*/brightness").ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_user_error() {
        let error = anyhow::anyhow!("Failed to connect to display server: refused");
        let formatted = format_user_error(&error);
        assert!(formatted.contains("ERROR"));
        assert!(formatted.contains("RandR"));
    }

    #[test]
    fn test_acpid_error_formatting() {
        let error = anyhow::anyhow!("Failed to connect to acpid socket /var/run/acpid.socket");
        let formatted = format_user_error(&error);
        assert!(formatted.contains("systemctl status acpid"));
    }

    #[test]
    fn test_context_chain_is_searched() {
        let error = anyhow::anyhow!("No such file or directory").context("Failed to read config file");
        let formatted = format_user_error(&error);
        assert!(formatted.contains("Configuration Error"));
    }

    #[test]
    fn test_generic_error_formatting() {
        let error = anyhow::anyhow!("something odd");
        let formatted = format_user_error(&error);
        assert!(formatted.contains("something odd"));
        assert!(formatted.contains("thinkpad_acpi"));
    }
}
