//! Bootstrap HTML page served for `/` and every client-side route.
//!
//! The page hosts the UI bundle and owns the single WebSocket the UI talks
//! through. It:
//!
//! 1. Opens a WebSocket to `location.host` (`ws:` or `wss:` to match the page)
//! 2. Re-dispatches each `extension-message` payload as a `message` event on
//!    `window`
//! 3. Exposes `window.__webviewBridge = { send, getSocket, postMessage }` and
//!    an `acquireVsCodeApi` shim over the same socket
//! 4. Reconnects 2 s after the socket closes
//! 5. Sends a `toolbar-action` when a toolbar button is pressed

// ============================================================================
// Types
// ============================================================================

/// Which UI bundle files exist in the build root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BundlePresence {
    /// `assets/index.js` exists.
    pub script: bool,
    /// `assets/index.css` exists.
    pub stylesheet: bool,
}

// ============================================================================
// Public Functions
// ============================================================================

/// Renders the bootstrap page.
///
/// Pure: the same presence flags always produce the same document.
#[must_use]
pub fn render(presence: BundlePresence) -> String {
    let script_tag = if presence.script { SCRIPT_TAG } else { "" };
    let stylesheet_tag = if presence.stylesheet { STYLESHEET_TAG } else { "" };

    BOOTSTRAP_HTML_TEMPLATE
        .replace("$STYLESHEET_TAG", stylesheet_tag)
        .replace("$SCRIPT_TAG", script_tag)
}

// ============================================================================
// Constants
// ============================================================================

/// Milliseconds the page waits before reconnecting.
pub const RECONNECT_DELAY_MS: u32 = 2000;

const SCRIPT_TAG: &str = r#"<script type="module" crossorigin src="/assets/index.js"></script>"#;

const STYLESHEET_TAG: &str = r#"<link rel="stylesheet" crossorigin href="/assets/index.css">"#;

/// Page template. `$STYLESHEET_TAG` and `$SCRIPT_TAG` are replaced with the
/// bundle tags, or nothing.
const BOOTSTRAP_HTML_TEMPLATE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Webview Bridge</title>
    <style>
        :root {
            --vscode-font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", sans-serif;
            --vscode-font-size: 13px;
            --vscode-editor-font-family: Menlo, Consolas, monospace;
            --vscode-foreground: #cccccc;
            --vscode-descriptionForeground: #9d9d9d;
            --vscode-editor-background: #1e1e1e;
            --vscode-sideBar-background: #252526;
            --vscode-button-background: #0e639c;
            --vscode-button-foreground: #ffffff;
            --vscode-button-hoverBackground: #1177bb;
            --vscode-input-background: #3c3c3c;
            --vscode-input-foreground: #cccccc;
            --vscode-input-border: #3c3c3c;
            --vscode-focusBorder: #007fd4;
            --vscode-panel-border: #2b2b2b;
            --vscode-errorForeground: #f48771;
            --vscode-textLink-foreground: #3794ff;
        }
        html, body {
            margin: 0;
            padding: 0;
            height: 100%;
            background: var(--vscode-editor-background);
            color: var(--vscode-foreground);
            font-family: var(--vscode-font-family);
            font-size: var(--vscode-font-size);
        }
        #bridge-toolbar {
            position: fixed;
            top: 0;
            left: 0;
            right: 0;
            height: 32px;
            display: flex;
            align-items: center;
            gap: 4px;
            padding: 0 8px;
            background: var(--vscode-sideBar-background);
            border-bottom: 1px solid var(--vscode-panel-border);
            z-index: 1000;
        }
        #bridge-toolbar button {
            background: transparent;
            color: var(--vscode-foreground);
            border: 1px solid transparent;
            border-radius: 3px;
            padding: 2px 8px;
            cursor: pointer;
            font: inherit;
        }
        #bridge-toolbar button:hover { border-color: var(--vscode-focusBorder); }
        #bridge-status {
            margin-left: auto;
            display: flex;
            align-items: center;
            gap: 6px;
            color: var(--vscode-descriptionForeground);
        }
        #bridge-status .dot {
            width: 8px;
            height: 8px;
            border-radius: 50%;
            background: var(--vscode-errorForeground);
        }
        #bridge-status[data-state="connected"] .dot { background: #89d185; }
        #root { padding-top: 32px; height: calc(100% - 32px); }
    </style>
    $STYLESHEET_TAG
</head>
<body>
    <div id="bridge-toolbar">
        <button type="button" data-action="newTask" title="New Task">New Task</button>
        <button type="button" data-action="history" title="History">History</button>
        <button type="button" data-action="settings" title="Settings">Settings</button>
        <button type="button" data-action="reload" title="Reload">Reload</button>
        <div id="bridge-status" data-state="connecting">
            <span class="dot"></span><span class="label">Connecting…</span>
        </div>
    </div>
    <div id="root"></div>
    <script>
    (function () {
        var RECONNECT_DELAY_MS = 2000;
        var socket = null;
        var queue = [];
        var status = document.getElementById("bridge-status");

        function setStatus(state, label) {
            status.setAttribute("data-state", state);
            status.querySelector(".label").textContent = label;
        }

        function send(envelope) {
            var text = JSON.stringify(envelope);
            if (socket && socket.readyState === WebSocket.OPEN) {
                socket.send(text);
            } else {
                queue.push(text);
            }
        }

        function postMessage(message) {
            send({ type: "webview-message", payload: message });
        }

        function connect() {
            var scheme = location.protocol === "https:" ? "wss:" : "ws:";
            socket = new WebSocket(scheme + "//" + location.host);

            socket.addEventListener("open", function () {
                setStatus("connected", "Connected");
                while (queue.length > 0) {
                    socket.send(queue.shift());
                }
            });

            socket.addEventListener("message", function (event) {
                var envelope;
                try {
                    envelope = JSON.parse(event.data);
                } catch (e) {
                    return;
                }
                if (envelope && envelope.type === "extension-message") {
                    window.dispatchEvent(new MessageEvent("message", { data: envelope.payload }));
                }
            });

            socket.addEventListener("close", function () {
                setStatus("disconnected", "Disconnected");
                setTimeout(connect, RECONNECT_DELAY_MS);
            });
        }

        window.__webviewBridge = {
            send: send,
            getSocket: function () { return socket; },
            postMessage: postMessage
        };

        var state;
        window.acquireVsCodeApi = function () {
            return {
                postMessage: postMessage,
                getState: function () { return state; },
                setState: function (next) { state = next; return next; }
            };
        };

        document.querySelectorAll("#bridge-toolbar button[data-action]").forEach(function (button) {
            button.addEventListener("click", function () {
                send({ type: "toolbar-action", action: button.getAttribute("data-action") });
            });
        });

        connect();
    })();
    </script>
    $SCRIPT_TAG
</body>
</html>"##;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_with_full_bundle() {
        let html = render(BundlePresence {
            script: true,
            stylesheet: true,
        });

        assert!(html.contains(r#"src="/assets/index.js""#));
        assert!(html.contains(r#"href="/assets/index.css""#));
        assert!(!html.contains("$SCRIPT_TAG"));
        assert!(!html.contains("$STYLESHEET_TAG"));
    }

    #[test]
    fn test_render_without_bundle() {
        let html = render(BundlePresence::default());
        assert!(!html.contains("/assets/index.js"));
        assert!(!html.contains("/assets/index.css"));
        assert!(html.contains(r#"<div id="root"></div>"#));
    }

    #[test]
    fn test_render_contains_toolbar_actions() {
        let html = render(BundlePresence::default());
        for action in ["newTask", "history", "settings", "reload"] {
            assert!(
                html.contains(&format!(r#"data-action="{action}""#)),
                "missing toolbar action {action}"
            );
        }
    }

    #[test]
    fn test_render_contains_bridge_script() {
        let html = render(BundlePresence::default());
        assert!(html.contains("window.__webviewBridge"));
        assert!(html.contains("acquireVsCodeApi"));
        assert!(html.contains("extension-message"));
        assert!(html.contains("webview-message"));
        assert!(html.contains("toolbar-action"));
        assert!(html.contains(&format!("RECONNECT_DELAY_MS = {RECONNECT_DELAY_MS}")));
    }

    #[test]
    fn test_render_is_pure() {
        let presence = BundlePresence {
            script: true,
            stylesheet: false,
        };
        assert_eq!(render(presence), render(presence));
    }
}
